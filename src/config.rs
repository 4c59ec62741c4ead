//! Configuration management

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub retention: RetentionConfig,
    pub supervision: SupervisionConfig,
    pub logging: LoggingConfig,
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied to cached scan results, in seconds.
    pub ttl_seconds: u64,
    /// Maximum number of cached snapshots.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_entries: 10_000,
        }
    }
}

/// Scan record retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub enabled: bool,
    /// Records older than this many days are swept.
    pub retention_days: u64,
    pub sweep_interval_hours: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retention_days: 90,
            sweep_interval_hours: 24,
        }
    }
}

/// Stale-scan supervision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionConfig {
    pub enabled: bool,
    /// A Running job untouched for longer than this is marked Failed.
    pub running_ceiling_minutes: u64,
    pub sweep_interval_minutes: u64,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            running_ceiling_minutes: 60,
            sweep_interval_minutes: 10,
        }
    }
}

/// Logging configuration
///
/// The library emits `tracing` events but installs no subscriber; the
/// embedding binary reads this section and feeds it to its own subscriber
/// setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "leakwatch=debug").
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("LEAKWATCH").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make a worker spin or a sweep no-op.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.cache.ttl_seconds == 0 {
            return Err(ConfigLoadError::Validation(
                "cache.ttl_seconds must be > 0".into(),
            ));
        }
        if self.retention.enabled && self.retention.retention_days == 0 {
            return Err(ConfigLoadError::Validation(
                "retention.retention_days must be > 0".into(),
            ));
        }
        if self.retention.enabled && self.retention.sweep_interval_hours == 0 {
            return Err(ConfigLoadError::Validation(
                "retention.sweep_interval_hours must be > 0".into(),
            ));
        }
        if self.supervision.enabled && self.supervision.running_ceiling_minutes == 0 {
            return Err(ConfigLoadError::Validation(
                "supervision.running_ceiling_minutes must be > 0".into(),
            ));
        }
        if self.supervision.enabled && self.supervision.sweep_interval_minutes == 0 {
            return Err(ConfigLoadError::Validation(
                "supervision.sweep_interval_minutes must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().expect("defaults are valid");
    }

    #[test]
    fn zero_ceiling_rejected_when_supervision_enabled() {
        let mut cfg = Config::default();
        cfg.supervision.enabled = true;
        cfg.supervision.running_ceiling_minutes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn disabled_workers_skip_their_validation() {
        let mut cfg = Config::default();
        cfg.retention.retention_days = 0;
        cfg.supervision.running_ceiling_minutes = 0;
        cfg.validate().expect("disabled sections are not validated");
    }
}
