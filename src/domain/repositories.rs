//! Persistence port for scan records

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::entities::ScanJob;
use super::value_objects::{ScanProvider, ScanSortField, ScanStatus, SortOrder};

/// Scan record persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Scan job not found: {0}")]
    NotFound(Uuid),
    /// Reserved for stores that enforce in-flight uniqueness on
    /// `(target, provider)` at the storage layer.
    #[error("Conflicting in-flight scan: {0}")]
    Conflict(String),
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Conjunctive filters for history queries; absent filters are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Substring match on the target URL.
    pub target_contains: Option<String>,
    pub provider: Option<ScanProvider>,
    pub status: Option<ScanStatus>,
}

/// Ordering applied to history queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistorySort {
    pub field: ScanSortField,
    pub order: SortOrder,
}

/// Durable store of scan records.
///
/// The store persists whatever state it is given and never mutates jobs on
/// its own; all lifecycle transitions happen in the orchestrator.
#[async_trait]
pub trait ScanRecordStore: Send + Sync {
    /// Persist a freshly created job, returning its id.
    async fn create(&self, job: &ScanJob) -> Result<Uuid, StoreError>;

    /// Persist the current state of an existing job.
    async fn save(&self, job: &ScanJob) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScanJob>, StoreError>;

    /// Most recent Pending/Running job for the exact `(target, provider)`
    /// pair, if any.
    async fn find_one_in_flight(
        &self,
        target: &str,
        provider: ScanProvider,
    ) -> Result<Option<ScanJob>, StoreError>;

    /// Filtered, ordered page of jobs plus the total count matching the
    /// filter (before offset/limit).
    async fn find_and_count(
        &self,
        filter: &HistoryFilter,
        sort: HistorySort,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<ScanJob>, u64), StoreError>;

    /// Number of jobs with the given status, or all jobs when `None`.
    async fn count(&self, status: Option<ScanStatus>) -> Result<u64, StoreError>;

    /// Remove a job record. Fails with [`StoreError::NotFound`] if absent.
    async fn remove(&self, id: Uuid) -> Result<(), StoreError>;

    /// Sum of `finding_count` over all jobs with the given status.
    async fn sum_finding_count(&self, status: ScanStatus) -> Result<u64, StoreError>;

    /// Delete records created before `cutoff`, returning how many were
    /// removed. Used by the retention sweep.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
