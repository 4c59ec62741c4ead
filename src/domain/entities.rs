//! Scan domain entities
//!
//! [`ScanJob`] owns its own state transitions: `start`, `succeed` and `fail`
//! validate against the state machine on [`ScanStatus`] and keep the derived
//! fields (`finding_count`, `verified_finding_count`, `duration_seconds`,
//! `updated_at`) consistent with the invariants:
//!
//! - `result` is present iff the job is `Completed`
//! - `error_message` present implies `Failed`
//! - `finding_count >= verified_finding_count`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{ScanProvider, ScanStatus, ScanTransitionError};

/// One secret finding inside a scanned repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretFinding {
    /// Detector tag that matched (e.g. "aws-access-key").
    pub detector: String,
    pub file_path: String,
    pub line: u32,
    /// Whether the secret was verified against the issuing service.
    pub verified: bool,
    /// Partial/redacted secret for context, never the full value.
    pub redacted: String,
}

/// Findings report produced by a scanner invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub findings: Vec<SecretFinding>,
}

impl ScanReport {
    pub fn finding_count(&self) -> usize {
        self.findings.len()
    }

    pub fn verified_finding_count(&self) -> usize {
        self.findings.iter().filter(|f| f.verified).count()
    }

    /// Drop unverified findings, keeping the report consistent for
    /// verified-only submissions.
    pub fn retain_verified(&mut self) {
        self.findings.retain(|f| f.verified);
    }
}

/// One scan attempt and its record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    pub target: String,
    pub provider: ScanProvider,
    pub status: ScanStatus,
    pub result: Option<ScanReport>,
    pub error_message: Option<String>,
    pub duration_seconds: u64,
    pub finding_count: usize,
    pub verified_finding_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ScanJob {
    /// Create a new job in `Pending`.
    pub fn new(target: impl Into<String>, provider: ScanProvider) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            target: target.into(),
            provider,
            status: ScanStatus::Pending,
            result: None,
            error_message: None,
            duration_seconds: 0,
            finding_count: 0,
            verified_finding_count: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
        }
    }

    /// `Pending → Running`; records the execution start time.
    pub fn start(&mut self) -> Result<(), ScanTransitionError> {
        self.transition(ScanStatus::Running)?;
        self.started_at = Some(self.updated_at);
        Ok(())
    }

    /// `Running → Completed`; stores the report and recomputes derived counts.
    pub fn succeed(&mut self, report: ScanReport) -> Result<(), ScanTransitionError> {
        self.transition(ScanStatus::Completed)?;
        self.finding_count = report.finding_count();
        self.verified_finding_count = report.verified_finding_count();
        self.result = Some(report);
        self.duration_seconds = self.elapsed_seconds();
        Ok(())
    }

    /// `Running → Failed`; stores the error message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ScanTransitionError> {
        self.transition(ScanStatus::Failed)?;
        self.error_message = Some(message.into());
        self.duration_seconds = self.elapsed_seconds();
        Ok(())
    }

    fn transition(&mut self, to: ScanStatus) -> Result<(), ScanTransitionError> {
        if !self.status.can_transition_to(&to) {
            return Err(ScanTransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn elapsed_seconds(&self) -> u64 {
        self.started_at
            .map(|started| (self.updated_at - started).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Externally visible projection of a [`ScanJob`].
///
/// This is the shape returned to callers and the value cached under the
/// `(target, provider)` key; the cache holds nothing the store does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub id: Uuid,
    pub target: String,
    pub provider: ScanProvider,
    pub status: ScanStatus,
    pub result: Option<ScanReport>,
    pub error_message: Option<String>,
    pub duration_seconds: u64,
    pub finding_count: usize,
    pub verified_finding_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ScanJob> for ScanSnapshot {
    fn from(job: &ScanJob) -> Self {
        Self {
            id: job.id,
            target: job.target.clone(),
            provider: job.provider,
            status: job.status,
            result: job.result.clone(),
            error_message: job.error_message.clone(),
            duration_seconds: job.duration_seconds,
            finding_count: job.finding_count,
            verified_finding_count: job.verified_finding_count,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}
