//! Integration tests for the submit/dedup/pipeline/delete behavior of
//! [`ScanOrchestrator`], using in-memory collaborators and scanner doubles.

mod common;

use std::sync::Arc;

use uuid::Uuid;

use leakwatch::application::errors::OrchestratorError;
use leakwatch::application::orchestrator::SubmitRequest;
use leakwatch::application::services::{ResultCache, result_cache_key};
use leakwatch::domain::repositories::ScanRecordStore;
use leakwatch::domain::value_objects::{ScanProvider, ScanStatus};

use common::{
    BlockingScanner, FailingScanner, StubScanner, TARGET, orchestrator, report, wait_for_status,
};

// ── Submit + pipeline ────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_returns_pending_then_completes_in_background() {
    let (orch, _store, _cache) =
        orchestrator(Arc::new(StubScanner { report: report("aws-access-key", 1, 2) }));

    let outcome = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .expect("submit should succeed");

    assert!(!outcome.from_cache);
    assert_eq!(outcome.job.status, ScanStatus::Pending);
    assert_eq!(outcome.job.target, TARGET);
    assert!(outcome.job.result.is_none());

    let done = wait_for_status(&orch, outcome.job.id, ScanStatus::Completed).await;
    assert_eq!(done.finding_count, 3);
    assert_eq!(done.verified_finding_count, 1);
    assert!(done.result.is_some());
    assert!(done.error_message.is_none());
}

#[tokio::test]
async fn invalid_target_is_rejected_without_creating_a_job() {
    let (orch, store, _cache) =
        orchestrator(Arc::new(StubScanner { report: report("aws-access-key", 0, 0) }));

    let err = orch
        .submit(SubmitRequest::new("not-a-url", ScanProvider::GitHub))
        .await
        .expect_err("malformed target must be rejected");

    assert!(matches!(err, OrchestratorError::Validation(_)));
    assert_eq!(store.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn verified_only_filters_the_stored_result() {
    let (orch, _store, _cache) =
        orchestrator(Arc::new(StubScanner { report: report("generic-api-key", 2, 5) }));

    let mut request = SubmitRequest::new(TARGET, ScanProvider::GitHub);
    request.verified_only = true;
    let outcome = orch.submit(request).await.unwrap();

    let done = wait_for_status(&orch, outcome.job.id, ScanStatus::Completed).await;
    assert_eq!(done.finding_count, 2);
    assert_eq!(done.verified_finding_count, 2);
    assert_eq!(done.result.unwrap().findings.len(), 2);
}

// ── Dedup ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_submit_joins_the_in_flight_job() {
    let (scanner, gate) = BlockingScanner::new(report("aws-access-key", 0, 0));
    let (orch, store, _cache) = orchestrator(Arc::new(scanner));

    let first = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();
    let second = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();

    assert_eq!(second.job.id, first.job.id, "dedup must return the same job");
    assert!(!second.from_cache);
    assert!(second.job.status.is_in_flight());
    assert_eq!(store.count(None).await.unwrap(), 1);

    gate.add_permits(1);
    wait_for_status(&orch, first.job.id, ScanStatus::Completed).await;
}

#[tokio::test]
async fn concurrent_submits_create_exactly_one_job() {
    let (scanner, gate) = BlockingScanner::new(report("aws-access-key", 0, 0));
    let (orch, store, _cache) = orchestrator(Arc::new(scanner));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            orch.submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
                .await
                .expect("submit should succeed")
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().job.id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 1, "all submits must observe the same job");
    assert_eq!(store.count(None).await.unwrap(), 1);

    gate.add_permits(8);
    wait_for_status(&orch, ids[0], ScanStatus::Completed).await;
}

#[tokio::test]
async fn different_providers_do_not_dedup_against_each_other() {
    let (scanner, gate) = BlockingScanner::new(report("aws-access-key", 0, 0));
    let (orch, store, _cache) = orchestrator(Arc::new(scanner));

    let a = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();
    let b = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitLab))
        .await
        .unwrap();

    assert_ne!(a.job.id, b.job.id);
    assert_eq!(store.count(None).await.unwrap(), 2);
    gate.add_permits(2);
}

// ── Cache behavior ───────────────────────────────────────────────────────────

#[tokio::test]
async fn completed_scan_is_served_from_cache() {
    let (orch, _store, _cache) =
        orchestrator(Arc::new(StubScanner { report: report("aws-access-key", 1, 0) }));

    let first = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();
    wait_for_status(&orch, first.job.id, ScanStatus::Completed).await;

    let second = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.job.id, first.job.id);
    assert_eq!(second.job.status, ScanStatus::Completed);
}

#[tokio::test]
async fn force_rescan_bypasses_cache_and_dedup() {
    let (orch, store, _cache) =
        orchestrator(Arc::new(StubScanner { report: report("aws-access-key", 1, 0) }));

    let first = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();
    wait_for_status(&orch, first.job.id, ScanStatus::Completed).await;

    let mut request = SubmitRequest::new(TARGET, ScanProvider::GitHub);
    request.force_rescan = true;
    let forced = orch.submit(request).await.unwrap();

    assert!(!forced.from_cache);
    assert_ne!(forced.job.id, first.job.id, "force must create a fresh job");
    assert_eq!(forced.job.status, ScanStatus::Pending);
    assert_eq!(store.count(None).await.unwrap(), 2);
    wait_for_status(&orch, forced.job.id, ScanStatus::Completed).await;
}

#[tokio::test]
async fn failed_scan_sets_error_and_leaves_cache_untouched() {
    let (orch, _store, cache) = orchestrator(Arc::new(FailingScanner {
        message: "clone failed: repository not found".into(),
    }));

    let outcome = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();
    let failed = wait_for_status(&orch, outcome.job.id, ScanStatus::Failed).await;

    assert_eq!(
        failed.error_message.as_deref(),
        Some("Scanner error: clone failed: repository not found")
    );
    assert!(failed.result.is_none());

    let key = result_cache_key(TARGET, ScanProvider::GitHub);
    assert!(
        cache.get(&key).await.unwrap().is_none(),
        "a failed scan must not populate the cache"
    );

    // A retry is not blocked by the failure: a fresh job is created.
    let retry = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();
    assert!(!retry.from_cache);
    assert_ne!(retry.job.id, outcome.job.id);
}

// ── get / delete ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_unknown_id_is_not_found() {
    let (orch, _store, _cache) =
        orchestrator(Arc::new(StubScanner { report: report("aws-access-key", 0, 0) }));

    let id = Uuid::new_v4();
    let err = orch.get(id).await.expect_err("unknown id");
    assert!(matches!(err, OrchestratorError::NotFound(got) if got == id));
}

#[tokio::test]
async fn delete_unknown_id_is_not_found() {
    let (orch, _store, _cache) =
        orchestrator(Arc::new(StubScanner { report: report("aws-access-key", 0, 0) }));

    let err = orch.delete(Uuid::new_v4()).await.expect_err("unknown id");
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn delete_removes_record_and_cache_entry() {
    let (orch, store, cache) =
        orchestrator(Arc::new(StubScanner { report: report("aws-access-key", 1, 0) }));

    let outcome = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();
    wait_for_status(&orch, outcome.job.id, ScanStatus::Completed).await;

    orch.delete(outcome.job.id).await.expect("delete succeeds");

    assert!(matches!(
        orch.get(outcome.job.id).await,
        Err(OrchestratorError::NotFound(_))
    ));
    assert_eq!(store.count(None).await.unwrap(), 0);

    let key = result_cache_key(TARGET, ScanProvider::GitHub);
    assert!(cache.get(&key).await.unwrap().is_none());

    // The next submit starts over instead of hitting stale state.
    let fresh = orch
        .submit(SubmitRequest::new(TARGET, ScanProvider::GitHub))
        .await
        .unwrap();
    assert!(!fresh.from_cache);
    assert_ne!(fresh.job.id, outcome.job.id);
}
