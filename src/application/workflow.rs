//! Scan workflow — centralised state-machine controller for scan jobs.
//!
//! Every status transition goes through [`ScanWorkflow`], which validates
//! the transition against the state machine on
//! [`ScanStatus`](crate::domain::value_objects::ScanStatus), then persists
//! the updated record.
//!
//! ```text
//! Orchestrator        ScanWorkflow        ScanRecordStore
//!     │                    │                     │
//!     ├─ submit ──────────►│                     │
//!     │                    │──── create ────────►│
//!     │◄── Job(Pending) ───┤                     │
//!     │                    │                     │
//!     │  (pipeline)        │                     │
//!     ├─ start_job ───────►│──── save ──────────►│
//!     ├─ complete_job ────►│──── save ──────────►│
//!     │   or fail_job ────►│──── save ──────────►│
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::entities::{ScanJob, ScanReport};
use crate::domain::repositories::{ScanRecordStore, StoreError};
use crate::domain::value_objects::ScanTransitionError;

/// Errors from the workflow layer.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid state transition: {0}")]
    InvalidTransition(#[from] ScanTransitionError),

    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),
}

/// Centralised job lifecycle controller.
///
/// The execution pipeline calls `ScanWorkflow` instead of mutating
/// [`ScanJob`] and the store directly, so a transition is never persisted
/// without being validated first.
#[derive(Clone)]
pub struct ScanWorkflow {
    store: Arc<dyn ScanRecordStore>,
}

impl ScanWorkflow {
    pub fn new(store: Arc<dyn ScanRecordStore>) -> Self {
        Self { store }
    }

    /// Persist a freshly created Pending job. No transition happens here, so
    /// the only failure mode is the store's.
    pub async fn create_job(&self, job: &ScanJob) -> Result<(), StoreError> {
        self.store.create(job).await?;
        info!(job_id = %job.id, target = %job.target, provider = %job.provider, "Scan job created");
        Ok(())
    }

    /// Transition a job to Running and persist.
    pub async fn start_job(&self, job: &mut ScanJob) -> Result<(), WorkflowError> {
        job.start()?;
        self.store.save(job).await?;
        info!(job_id = %job.id, "Scan job transitioned to Running");
        Ok(())
    }

    /// Transition a job to Completed with its report and persist.
    pub async fn complete_job(
        &self,
        job: &mut ScanJob,
        report: ScanReport,
    ) -> Result<(), WorkflowError> {
        job.succeed(report)?;
        self.store.save(job).await?;
        info!(
            job_id = %job.id,
            finding_count = job.finding_count,
            verified_finding_count = job.verified_finding_count,
            duration_seconds = job.duration_seconds,
            "Scan job transitioned to Completed"
        );
        Ok(())
    }

    /// Transition a job to Failed with an error message and persist.
    pub async fn fail_job(&self, job: &mut ScanJob, error: &str) -> Result<(), WorkflowError> {
        job.fail(error)?;
        self.store.save(job).await?;
        warn!(job_id = %job.id, error, "Scan job transitioned to Failed");
        Ok(())
    }
}
