//! Background workers for the leakwatch orchestrator
//!
//! This module contains the periodic maintenance tasks: record retention and
//! supervision of stuck in-flight scans. Both are opt-in via configuration
//! and shut down cooperatively through a [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::workflow::ScanWorkflow;
use crate::config::{RetentionConfig, SupervisionConfig};
use crate::domain::repositories::{HistoryFilter, HistorySort, ScanRecordStore};
use crate::domain::value_objects::{ScanSortField, ScanStatus, SortOrder};

const SWEEP_PAGE_SIZE: u64 = 100;

/// Spawn a background worker that periodically deletes scan records older
/// than the configured retention window. No task is spawned when the section
/// is disabled.
pub fn spawn_retention_worker(
    store: Arc<dyn ScanRecordStore>,
    config: &RetentionConfig,
    shutdown_token: CancellationToken,
) {
    if !config.enabled {
        debug!("Retention worker disabled, not spawning");
        return;
    }

    let retention_days = config.retention_days;
    let interval_hours = config.sweep_interval_hours;
    let mut interval = tokio::time::interval(Duration::from_secs(interval_hours * 3600));

    tokio::spawn(async move {
        info!(retention_days, interval_hours, "Retention worker started");

        // The first tick fires immediately; skip it so startup stays quiet.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
                    match store.delete_older_than(cutoff).await {
                        Ok(removed) if removed > 0 => {
                            info!(removed, "Retention sweep deleted old scan records");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(error = %e, "Retention sweep failed");
                        }
                    }
                }
                _ = shutdown_token.cancelled() => {
                    info!("Retention worker shutting down");
                    break;
                }
            }
        }
    });
}

/// Spawn a background worker that fails in-flight scans untouched beyond the
/// configured ceiling. No task is spawned when the section is disabled.
///
/// The orchestrator itself never times a job out; this sweep is what makes a
/// hung scanner, a save-after-delete, or a failed pipeline save eventually
/// observable as `Failed`.
pub fn spawn_supervision_worker(
    store: Arc<dyn ScanRecordStore>,
    config: &SupervisionConfig,
    shutdown_token: CancellationToken,
) {
    if !config.enabled {
        debug!("Supervision worker disabled, not spawning");
        return;
    }

    let ceiling_minutes = config.running_ceiling_minutes;
    let interval_minutes = config.sweep_interval_minutes;
    let mut interval = tokio::time::interval(Duration::from_secs(interval_minutes * 60));

    tokio::spawn(async move {
        info!(
            ceiling_minutes,
            interval_minutes, "Supervision worker started"
        );

        let workflow = ScanWorkflow::new(store.clone());
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    sweep_stale_in_flight(&store, &workflow, ceiling_minutes).await;
                }
                _ = shutdown_token.cancelled() => {
                    info!("Supervision worker shutting down");
                    break;
                }
            }
        }
    });
}

/// Fail every in-flight job whose last update is older than the ceiling.
///
/// Covers both `Running` jobs with a hung or crashed pipeline and jobs
/// orphaned in `Pending` by a failed start save.
pub async fn sweep_stale_in_flight(
    store: &Arc<dyn ScanRecordStore>,
    workflow: &ScanWorkflow,
    ceiling_minutes: u64,
) {
    let deadline = Utc::now() - chrono::Duration::minutes(ceiling_minutes as i64);
    for status in [ScanStatus::Running, ScanStatus::Pending] {
        sweep_status(store, workflow, status, deadline, ceiling_minutes).await;
    }
}

async fn sweep_status(
    store: &Arc<dyn ScanRecordStore>,
    workflow: &ScanWorkflow,
    status: ScanStatus,
    deadline: DateTime<Utc>,
    ceiling_minutes: u64,
) {
    let filter = HistoryFilter {
        status: Some(status),
        ..HistoryFilter::default()
    };
    // Oldest updates first, so each pass drains the stalest page. Failing a
    // job removes it from the swept status, which is why the offset stays 0.
    let sort = HistorySort {
        field: ScanSortField::UpdatedAt,
        order: SortOrder::Asc,
    };

    loop {
        let page = match store.find_and_count(&filter, sort, 0, SWEEP_PAGE_SIZE).await {
            Ok((jobs, _)) => jobs,
            Err(e) => {
                error!(error = %e, "Supervision sweep query failed");
                return;
            }
        };

        let stale: Vec<_> = page
            .into_iter()
            .filter(|job| job.updated_at < deadline)
            .collect();
        if stale.is_empty() {
            return;
        }

        let mut cleared = 0usize;
        for mut job in stale {
            let message = format!(
                "scan exceeded supervision deadline of {ceiling_minutes} minutes"
            );
            // An orphaned Pending job has to pass through Running to reach
            // Failed legally.
            let result = match job.status {
                ScanStatus::Pending => match workflow.start_job(&mut job).await {
                    Ok(()) => workflow.fail_job(&mut job, &message).await,
                    Err(e) => Err(e),
                },
                _ => workflow.fail_job(&mut job, &message).await,
            };
            match result {
                Ok(()) => {
                    cleared += 1;
                    warn!(job_id = %job.id, target = %job.target, "Supervision marked stale scan as Failed");
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "Supervision failed to mark stale scan");
                }
            }
        }
        // A pass that cleared nothing would re-read the same page; give up
        // until the next sweep.
        if cleared == 0 {
            return;
        }
    }
}
