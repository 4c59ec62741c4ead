//! leakwatch — scan orchestration core for secret-exposure scanning
//!
//! This crate implements the orchestration layer of a service that scans
//! remote git repositories for leaked credentials: it decides, per submit,
//! whether to serve a cached result, join an already-running scan, or start
//! a new one; drives each scan job through its lifecycle; and keeps the
//! persisted record, the result cache, and the in-flight execution
//! consistent under concurrent requests for the same target.
//!
//! The actual detection engine, the durable store, and the cache engine are
//! collaborators behind ports ([`Scanner`](application::services::Scanner),
//! [`ScanRecordStore`](domain::repositories::ScanRecordStore),
//! [`ResultCache`](application::services::ResultCache)); in-memory adapters
//! ship under [`infrastructure`].
//!
//! # Architecture
//!
//! ```text
//! leakwatch/
//! ├── application/     # Orchestrator, workflow, ports, errors
//! ├── domain/          # ScanJob state machine, reports, store port
//! ├── infrastructure/  # In-memory store + moka cache adapters
//! └── workers/         # Retention sweep, stale-scan supervision
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use leakwatch::application::orchestrator::{ScanOrchestrator, SubmitRequest};
//! use leakwatch::application::services::{ScanError, Scanner};
//! use leakwatch::domain::entities::ScanReport;
//! use leakwatch::domain::value_objects::ScanProvider;
//! use leakwatch::infrastructure::{MemoryScanStore, MokaResultCache};
//!
//! struct MyScanner;
//!
//! #[async_trait::async_trait]
//! impl Scanner for MyScanner {
//!     async fn scan(&self, _target: &str) -> Result<ScanReport, ScanError> {
//!         Ok(ScanReport::default())
//!     }
//!     fn supported_detector_tags(&self) -> Vec<String> {
//!         vec!["aws-access-key".into()]
//!     }
//! }
//!
//! # async fn run() {
//! let orchestrator = ScanOrchestrator::new(
//!     Arc::new(MemoryScanStore::new()),
//!     Arc::new(MokaResultCache::new(10_000)),
//!     Arc::new(MyScanner),
//!     Duration::from_secs(3600),
//! );
//!
//! let outcome = orchestrator
//!     .submit(SubmitRequest::new(
//!         "https://github.com/acme/app.git",
//!         ScanProvider::GitHub,
//!     ))
//!     .await
//!     .unwrap();
//! let job = orchestrator.get(outcome.job.id).await.unwrap();
//! # }
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod workers;
