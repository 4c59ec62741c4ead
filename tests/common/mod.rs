//! Shared fixtures and scanner doubles for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use leakwatch::application::orchestrator::ScanOrchestrator;
use leakwatch::application::services::{ScanError, Scanner};
use leakwatch::domain::entities::{ScanReport, ScanSnapshot, SecretFinding};
use leakwatch::domain::value_objects::ScanStatus;
use leakwatch::infrastructure::{MemoryScanStore, MokaResultCache};

pub const TARGET: &str = "https://example.com/a.git";

/// Build a report with `verified` verified and `unverified` unverified
/// findings, all using the given detector tag.
pub fn report(detector: &str, verified: usize, unverified: usize) -> ScanReport {
    let mut findings = Vec::new();
    for i in 0..verified {
        findings.push(SecretFinding {
            detector: detector.to_string(),
            file_path: format!("src/creds_{i}.env"),
            line: 3,
            verified: true,
            redacted: "AKIA****".into(),
        });
    }
    for i in 0..unverified {
        findings.push(SecretFinding {
            detector: detector.to_string(),
            file_path: format!("config/app_{i}.yml"),
            line: 12,
            verified: false,
            redacted: "tok-****".into(),
        });
    }
    ScanReport { findings }
}

/// Scanner double that returns a preset report immediately.
pub struct StubScanner {
    pub report: ScanReport,
}

#[async_trait]
impl Scanner for StubScanner {
    async fn scan(&self, _target: &str) -> Result<ScanReport, ScanError> {
        Ok(self.report.clone())
    }

    fn supported_detector_tags(&self) -> Vec<String> {
        vec!["aws-access-key".into(), "generic-api-key".into()]
    }
}

/// Scanner double that always fails.
pub struct FailingScanner {
    pub message: String,
}

#[async_trait]
impl Scanner for FailingScanner {
    async fn scan(&self, _target: &str) -> Result<ScanReport, ScanError> {
        Err(ScanError::Scanner(self.message.clone()))
    }

    fn supported_detector_tags(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Scanner double that blocks until the test releases it, keeping the job
/// in flight for as long as the test needs.
pub struct BlockingScanner {
    gate: Arc<Semaphore>,
    pub report: ScanReport,
}

impl BlockingScanner {
    pub fn new(report: ScanReport) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: gate.clone(),
                report,
            },
            gate,
        )
    }
}

#[async_trait]
impl Scanner for BlockingScanner {
    async fn scan(&self, _target: &str) -> Result<ScanReport, ScanError> {
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        Ok(self.report.clone())
    }

    fn supported_detector_tags(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Orchestrator wired to fresh in-memory collaborators.
pub fn orchestrator(
    scanner: Arc<dyn Scanner>,
) -> (ScanOrchestrator, Arc<MemoryScanStore>, Arc<MokaResultCache>) {
    let store = Arc::new(MemoryScanStore::new());
    let cache = Arc::new(MokaResultCache::new(1024));
    let orch = ScanOrchestrator::new(
        store.clone(),
        cache.clone(),
        scanner,
        Duration::from_secs(300),
    );
    (orch, store, cache)
}

/// Poll `get` until the job reaches `status` or the deadline passes.
pub async fn wait_for_status(
    orch: &ScanOrchestrator,
    id: Uuid,
    status: ScanStatus,
) -> ScanSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = orch.get(id).await.expect("job should exist while polling");
        if snapshot.status == status {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "job {id} did not reach {status} in time, last seen {}",
                snapshot.status
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
