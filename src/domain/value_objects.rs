//! Orchestrator value objects

use serde::{Deserialize, Serialize};

/// Source-hosting provider a scan target belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanProvider {
    GitHub,
    GitLab,
    Bitbucket,
    Gitea,
}

impl ScanProvider {
    /// Canonical lowercase name, used in cache keys and logs.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Bitbucket => "bitbucket",
            Self::Gitea => "gitea",
        }
    }
}

impl std::fmt::Display for ScanProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Scan job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    /// Job created, execution not yet started
    Pending,
    /// Job is currently being scanned
    Running,
    /// Scan completed successfully
    Completed,
    /// Scan failed
    Failed,
}

impl ScanStatus {
    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// Pending ──► Running ──► Completed
    ///                │
    ///                └──► Failed
    /// ```
    pub fn valid_transitions(&self) -> &[ScanStatus] {
        match self {
            Self::Pending => &[Self::Running],
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    /// Check whether transitioning to `target` is allowed from the current state.
    pub fn can_transition_to(&self, target: &ScanStatus) -> bool {
        self.valid_transitions().contains(target)
    }

    /// Whether this status represents a terminal (final) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether this status counts as in-flight for dedup purposes.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, thiserror::Error)]
#[error("Invalid scan transition from {from} to {to}")]
pub struct ScanTransitionError {
    pub from: ScanStatus,
    pub to: ScanStatus,
}

/// Field a history query can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanSortField {
    CreatedAt,
    UpdatedAt,
    DurationSeconds,
    FindingCount,
}

impl Default for ScanSortField {
    fn default() -> Self {
        Self::CreatedAt
    }
}

/// Sort direction for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Desc
    }
}
