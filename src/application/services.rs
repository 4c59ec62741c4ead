//! Collaborator ports consumed by the orchestrator
//!
//! The cache and scanner are external services behind narrow traits; the
//! orchestrator never depends on a concrete engine.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::domain::entities::{ScanReport, ScanSnapshot};
use crate::domain::value_objects::ScanProvider;

/// Cache operation errors. Never fatal: the orchestrator degrades any cache
/// error to a miss, the cache is not a source of truth.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache serialization failed: {0}")]
    Serialization(String),
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Volatile key-value store with per-entry TTL.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ScanSnapshot>, CacheError>;

    async fn set(
        &self,
        key: &str,
        snapshot: &ScanSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Deterministic cache key for a `(target, provider)` pair.
///
/// The target URL is hashed so the key stays opaque and bounded regardless
/// of URL length.
pub fn result_cache_key(target: &str, provider: ScanProvider) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(target.as_bytes());
    format!(
        "scan:{}:{}",
        provider.canonical_name(),
        hex::encode(hasher.finalize())
    )
}

/// Errors from a scanner invocation. The orchestrator treats every variant
/// identically: the job transitions to Failed with the error's description.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Scanner error: {0}")]
    Scanner(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Scan timed out after {0} seconds")]
    Timeout(u64),
}

/// External secret-detection engine.
///
/// Scanning is slow (seconds to minutes) and may fail independently of the
/// orchestrator; any timeout is the scanner's own.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, target: &str) -> Result<ScanReport, ScanError>;

    /// Whether `target` is a syntactically valid absolute HTTP/HTTPS URL.
    fn validate_target_url(&self, target: &str) -> bool {
        match Url::parse(target) {
            Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
            Err(_) => false,
        }
    }

    /// Detector tags this scanner can emit.
    fn supported_detector_tags(&self) -> Vec<String>;
}
