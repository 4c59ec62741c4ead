//! In-memory scan record store
//!
//! Reference adapter behind [`ScanRecordStore`] for tests and single-node
//! deployments. Query semantics (conjunctive filters, ordering, offset/limit,
//! count-before-paging) match what a SQL-backed store would return.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::ScanJob;
use crate::domain::repositories::{
    HistoryFilter, HistorySort, ScanRecordStore, StoreError,
};
use crate::domain::value_objects::{ScanProvider, ScanSortField, ScanStatus, SortOrder};

/// In-memory [`ScanRecordStore`] backed by a `RwLock`'d map.
#[derive(Default)]
pub struct MemoryScanStore {
    jobs: RwLock<HashMap<Uuid, ScanJob>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(job: &ScanJob, filter: &HistoryFilter) -> bool {
        if let Some(needle) = &filter.target_contains
            && !job.target.contains(needle.as_str())
        {
            return false;
        }
        if let Some(provider) = filter.provider
            && job.provider != provider
        {
            return false;
        }
        if let Some(status) = filter.status
            && job.status != status
        {
            return false;
        }
        true
    }

    fn compare(a: &ScanJob, b: &ScanJob, sort: HistorySort) -> Ordering {
        let ordering = match sort.field {
            ScanSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            ScanSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            ScanSortField::DurationSeconds => a.duration_seconds.cmp(&b.duration_seconds),
            ScanSortField::FindingCount => a.finding_count.cmp(&b.finding_count),
        };
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[async_trait]
impl ScanRecordStore for MemoryScanStore {
    async fn create(&self, job: &ScanJob) -> Result<Uuid, StoreError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job.id)
    }

    async fn save(&self, job: &ScanJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => {
                // Save after delete: the record is gone and stays gone.
                debug!(job_id = %job.id, "Dropping save for removed scan job");
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScanJob>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn find_one_in_flight(
        &self,
        target: &str,
        provider: ScanProvider,
    ) -> Result<Option<ScanJob>, StoreError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| {
                job.target == target && job.provider == provider && job.status.is_in_flight()
            })
            .max_by_key(|job| job.created_at)
            .cloned())
    }

    async fn find_and_count(
        &self,
        filter: &HistoryFilter,
        sort: HistorySort,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<ScanJob>, u64), StoreError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<ScanJob> = jobs
            .values()
            .filter(|job| Self::matches(job, filter))
            .cloned()
            .collect();
        let total = matching.len() as u64;

        matching.sort_by(|a, b| Self::compare(a, b, sort));
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn count(&self, status: Option<ScanStatus>) -> Result<u64, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(match status {
            Some(status) => jobs.values().filter(|job| job.status == status).count() as u64,
            None => jobs.len() as u64,
        })
    }

    async fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        match self.jobs.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn sum_finding_count(&self, status: ScanStatus) -> Result<u64, StoreError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == status)
            .map(|job| job.finding_count as u64)
            .sum())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.created_at >= cutoff);
        Ok((before - jobs.len()) as u64)
    }
}
