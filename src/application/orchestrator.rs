//! Scan orchestrator — the decision core of the service.
//!
//! For every submit the orchestrator decides between three outcomes: serve
//! the cached result, join an already in-flight scan for the same target, or
//! create a fresh job and hand it to the detached execution pipeline. It
//! also answers lookups, history queries and aggregate statistics over the
//! persisted records, and deletes records together with their cache entry.
//!
//! The cache is checked before the dedup query so the common
//! "already scanned, unchanged" path never touches the store; the dedup
//! query only runs on a cache miss, which is already the slow path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::errors::OrchestratorError;
use crate::application::services::{ResultCache, Scanner, result_cache_key};
use crate::application::workflow::ScanWorkflow;
use crate::domain::entities::{ScanJob, ScanSnapshot};
use crate::domain::repositories::{HistoryFilter, HistorySort, ScanRecordStore};
use crate::domain::value_objects::{ScanProvider, ScanSortField, ScanStatus, SortOrder};

/// Page size used when streaming completed jobs for statistics.
const STATS_PAGE_SIZE: u64 = 100;

/// A request to scan a repository.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub target: String,
    pub provider: ScanProvider,
    /// Bypass both the cache and the in-flight dedup check and always create
    /// a fresh job.
    pub force_rescan: bool,
    /// Keep only verified findings in the stored result.
    pub verified_only: bool,
}

impl SubmitRequest {
    pub fn new(target: impl Into<String>, provider: ScanProvider) -> Self {
        Self {
            target: target.into(),
            provider,
            force_rescan: false,
            verified_only: false,
        }
    }
}

/// Outcome of a submit: the job's current snapshot, annotated with whether
/// it was served from the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub job: ScanSnapshot,
    pub from_cache: bool,
}

/// History query parameters.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub target: Option<String>,
    pub provider: Option<ScanProvider>,
    pub status: Option<ScanStatus>,
    pub page: u64,
    pub limit: u64,
    pub sort_by: ScanSortField,
    pub sort_order: SortOrder,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            target: None,
            provider: None,
            status: None,
            page: 1,
            limit: 20,
            sort_by: ScanSortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

/// One page of scan history plus pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<ScanSnapshot>,
    pub page: u64,
    pub limit: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Occurrence count for one detector tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorCount {
    pub detector: String,
    pub count: u64,
}

/// Aggregates over all persisted scan jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStatistics {
    pub total_scans: u64,
    pub completed_scans: u64,
    pub failed_scans: u64,
    /// Count of Pending plus Running jobs.
    pub running_scans: u64,
    /// Sum of finding counts over completed jobs.
    pub total_findings: u64,
    /// Rounded to the nearest integer; 0 when nothing has completed.
    pub average_findings_per_scan: u64,
    /// `round(100 * completed / total)`; 0 when there are no scans.
    pub success_rate: u64,
    /// The 10 most frequent detector tags across completed jobs, ties broken
    /// by first-encountered order.
    pub top_detectors: Vec<DetectorCount>,
}

/// The scan orchestration service.
///
/// Cheap to clone; all state is behind `Arc`s so a clone can be moved into
/// the detached execution pipeline.
#[derive(Clone)]
pub struct ScanOrchestrator {
    store: Arc<dyn ScanRecordStore>,
    cache: Arc<dyn ResultCache>,
    scanner: Arc<dyn Scanner>,
    workflow: ScanWorkflow,
    cache_ttl: Duration,
    /// Per-`(target, provider)` submission gates. Serialising the
    /// dedup-check-then-create sequence per key closes the race where two
    /// concurrent submits for the same target both observe "no in-flight
    /// job" and create two Pending jobs.
    submission_gates: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ScanOrchestrator {
    pub fn new(
        store: Arc<dyn ScanRecordStore>,
        cache: Arc<dyn ResultCache>,
        scanner: Arc<dyn Scanner>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            workflow: ScanWorkflow::new(store.clone()),
            store,
            cache,
            scanner,
            cache_ttl,
            submission_gates: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // ── Submit ───────────────────────────────────────────────────────

    /// Submit a scan request.
    ///
    /// Returns immediately in all cases; when a new job is created its
    /// execution runs as a detached background task and the caller polls
    /// [`get`](Self::get) for completion.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome, OrchestratorError> {
        if !self.scanner.validate_target_url(&request.target) {
            return Err(OrchestratorError::Validation(format!(
                "target must be an absolute http(s) URL: {}",
                request.target
            )));
        }

        let key = result_cache_key(&request.target, request.provider);

        if !request.force_rescan {
            // Fast path: cache hit bypasses the store entirely. Cache errors
            // degrade to a miss, never to a failed request.
            match self.cache.get(&key).await {
                Ok(Some(snapshot)) => {
                    debug!(target = %request.target, provider = %request.provider, "Cache hit for scan result");
                    return Ok(SubmitOutcome {
                        job: snapshot,
                        from_cache: true,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target = %request.target, error = %e, "Cache lookup failed, treating as miss");
                }
            }

            // Slow path: dedup-check-then-create, serialised per key so
            // concurrent submits cannot create two in-flight jobs.
            let gate = self.submission_gate(&key).await;
            let outcome = {
                let _guard = gate.lock().await;

                match self
                    .store
                    .find_one_in_flight(&request.target, request.provider)
                    .await
                {
                    Ok(Some(existing)) => {
                        info!(
                            job_id = %existing.id,
                            target = %request.target,
                            "Joining in-flight scan for target"
                        );
                        Ok(SubmitOutcome {
                            job: ScanSnapshot::from(&existing),
                            from_cache: false,
                        })
                    }
                    Ok(None) => self.create_and_launch(&request).await,
                    Err(e) => Err(e.into()),
                }
            };
            drop(gate);
            self.release_submission_gate(&key).await;
            return outcome;
        }

        // Forced rescan: no cache, no dedup, always a fresh job.
        info!(target = %request.target, provider = %request.provider, "Forced rescan requested");
        self.create_and_launch(&request).await
    }

    async fn create_and_launch(
        &self,
        request: &SubmitRequest,
    ) -> Result<SubmitOutcome, OrchestratorError> {
        let job = ScanJob::new(request.target.clone(), request.provider);
        self.workflow.create_job(&job).await?;

        let snapshot = ScanSnapshot::from(&job);
        let pipeline = self.clone();
        let verified_only = request.verified_only;
        tokio::spawn(async move {
            pipeline.run_pipeline(job, verified_only).await;
        });

        Ok(SubmitOutcome {
            job: snapshot,
            from_cache: false,
        })
    }

    async fn submission_gate(&self, key: &str) -> Arc<Mutex<()>> {
        let mut gates = self.submission_gates.lock().await;
        gates
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a gate nobody else is waiting on, so the map does not grow with
    /// every distinct target ever submitted.
    async fn release_submission_gate(&self, key: &str) {
        let mut gates = self.submission_gates.lock().await;
        if let Some(gate) = gates.get(key)
            && Arc::strong_count(gate) == 1
        {
            gates.remove(key);
        }
    }

    // ── Execution pipeline ───────────────────────────────────────────

    /// Drive one job through `Running → Completed/Failed`.
    ///
    /// Runs detached from the request path: there is no caller listening, so
    /// every error here is logged and swallowed. A persistence failure
    /// leaves the job in whatever state it last reached.
    async fn run_pipeline(&self, mut job: ScanJob, verified_only: bool) {
        let job_id = job.id;

        if let Err(e) = self.workflow.start_job(&mut job).await {
            error!(job_id = %job_id, error = %e, "Failed to start scan job");
            return;
        }

        match self.scanner.scan(&job.target).await {
            Ok(mut report) => {
                if verified_only {
                    report.retain_verified();
                }

                if let Err(e) = self.workflow.complete_job(&mut job, report).await {
                    error!(job_id = %job_id, error = %e, "Failed to persist completed scan");
                    return;
                }

                // Populate the cache on success only; a failed scan must not
                // poison the cache or block a later retry.
                let key = result_cache_key(&job.target, job.provider);
                let snapshot = ScanSnapshot::from(&job);
                if let Err(e) = self.cache.set(&key, &snapshot, self.cache_ttl).await {
                    warn!(job_id = %job_id, error = %e, "Failed to cache scan result");
                }
            }
            Err(scan_err) => {
                if let Err(e) = self.workflow.fail_job(&mut job, &scan_err.to_string()).await {
                    error!(job_id = %job_id, error = %e, "Failed to persist scan failure");
                }
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Current snapshot of a job by id.
    pub async fn get(&self, id: Uuid) -> Result<ScanSnapshot, OrchestratorError> {
        let job = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(OrchestratorError::NotFound(id))?;
        Ok(ScanSnapshot::from(&job))
    }

    /// Filtered, ordered page of scan history.
    pub async fn list_history(
        &self,
        query: HistoryQuery,
    ) -> Result<HistoryPage, OrchestratorError> {
        if query.page < 1 {
            return Err(OrchestratorError::Validation(
                "page must be >= 1".to_string(),
            ));
        }
        if query.limit < 1 || query.limit > 100 {
            return Err(OrchestratorError::Validation(
                "limit must be between 1 and 100".to_string(),
            ));
        }

        let filter = HistoryFilter {
            target_contains: query.target,
            provider: query.provider,
            status: query.status,
        };
        let sort = HistorySort {
            field: query.sort_by,
            order: query.sort_order,
        };
        let offset = (query.page - 1).checked_mul(query.limit).ok_or_else(|| {
            OrchestratorError::Validation("page is out of range".to_string())
        })?;

        let (jobs, total_items) = self
            .store
            .find_and_count(&filter, sort, offset, query.limit)
            .await?;

        let total_pages = total_items.div_ceil(query.limit);
        Ok(HistoryPage {
            items: jobs.iter().map(ScanSnapshot::from).collect(),
            page: query.page,
            limit: query.limit,
            total_items,
            total_pages,
            has_next: query.page < total_pages,
            has_previous: query.page > 1,
        })
    }

    /// Aggregate statistics over all persisted jobs, computed on read.
    pub async fn statistics(&self) -> Result<ScanStatistics, OrchestratorError> {
        let total_scans = self.store.count(None).await?;
        let completed_scans = self.store.count(Some(ScanStatus::Completed)).await?;
        let failed_scans = self.store.count(Some(ScanStatus::Failed)).await?;
        let pending = self.store.count(Some(ScanStatus::Pending)).await?;
        let running = self.store.count(Some(ScanStatus::Running)).await?;
        let total_findings = self.store.sum_finding_count(ScanStatus::Completed).await?;

        let average_findings_per_scan = if completed_scans == 0 {
            0
        } else {
            (total_findings as f64 / completed_scans as f64).round() as u64
        };
        let success_rate = if total_scans == 0 {
            0
        } else {
            (100.0 * completed_scans as f64 / total_scans as f64).round() as u64
        };

        Ok(ScanStatistics {
            total_scans,
            completed_scans,
            failed_scans,
            running_scans: pending + running,
            total_findings,
            average_findings_per_scan,
            success_rate,
            top_detectors: self.top_detectors().await?,
        })
    }

    /// Occurrence counts of detector tags across completed jobs' reports,
    /// streamed page by page so memory stays bounded by the page size.
    async fn top_detectors(&self) -> Result<Vec<DetectorCount>, OrchestratorError> {
        let filter = HistoryFilter {
            status: Some(ScanStatus::Completed),
            ..HistoryFilter::default()
        };
        let sort = HistorySort {
            field: ScanSortField::CreatedAt,
            order: SortOrder::Asc,
        };

        let mut counts: HashMap<String, u64> = HashMap::new();
        let mut encounter_order: Vec<String> = Vec::new();
        let mut offset = 0;

        loop {
            let (jobs, total) = self
                .store
                .find_and_count(&filter, sort, offset, STATS_PAGE_SIZE)
                .await?;
            for job in &jobs {
                let Some(report) = &job.result else { continue };
                for finding in &report.findings {
                    if !counts.contains_key(&finding.detector) {
                        encounter_order.push(finding.detector.clone());
                    }
                    *counts.entry(finding.detector.clone()).or_insert(0) += 1;
                }
            }
            offset += jobs.len() as u64;
            if jobs.is_empty() || offset >= total {
                break;
            }
        }

        // Stable sort over first-encountered order breaks count ties the way
        // they were first seen.
        let mut detectors: Vec<DetectorCount> = encounter_order
            .into_iter()
            .map(|detector| {
                let count = counts[&detector];
                DetectorCount { detector, count }
            })
            .collect();
        detectors.sort_by(|a, b| b.count.cmp(&a.count));
        detectors.truncate(10);
        Ok(detectors)
    }

    // ── Delete ───────────────────────────────────────────────────────

    /// Delete a job record and its cache entry.
    ///
    /// Deleting an in-flight job does not stop its pipeline; the pipeline's
    /// eventual save lands on a removed record and is dropped by the store.
    pub async fn delete(&self, id: Uuid) -> Result<(), OrchestratorError> {
        let job = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(OrchestratorError::NotFound(id))?;

        let key = result_cache_key(&job.target, job.provider);
        if let Err(e) = self.cache.delete(&key).await {
            warn!(job_id = %id, error = %e, "Failed to delete cache entry for scan");
        }

        self.store.remove(id).await?;
        info!(job_id = %id, target = %job.target, "Scan job deleted");
        Ok(())
    }
}
