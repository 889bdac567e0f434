//! Environment-driven configuration.
//!
//! All knobs are read from `PERIL_*` variables with typed parse errors
//! naming the offending variable. Missing variables fall back to defaults,
//! so a bare environment yields a usable local configuration.

use crate::error::{Error, Result};
use crate::observability::LogFormat;

/// Runtime configuration for Peril services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Object storage bucket name (e.g. `my-bucket`, `s3://my-bucket`).
    ///
    /// When unset, callers fall back to an in-memory backend.
    pub storage_bucket: Option<String>,
    /// Number of dated backup folders retained before eviction.
    pub backup_retained: usize,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_bucket: None,
            backup_retained: 7,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Builds a configuration from `PERIL_*` environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PERIL_STORAGE_BUCKET`: object storage bucket
    /// - `PERIL_BACKUP_RETAINED`: dated backup retention count
    /// - `PERIL_LOG_FORMAT`: `json` or `pretty`
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        config.storage_bucket = env_string("PERIL_STORAGE_BUCKET");
        if let Some(retained) = env_usize("PERIL_BACKUP_RETAINED")? {
            config.backup_retained = retained;
        }
        if let Some(format) = env_log_format("PERIL_LOG_FORMAT")? {
            config.log_format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for invalid values.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `backup_retained` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.backup_retained == 0 {
            return Err(Error::InvalidInput(
                "PERIL_BACKUP_RETAINED must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<usize>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a usize: {e}")))
}

fn env_log_format(name: &str) -> Result<Option<LogFormat>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<LogFormat>()
        .map(Some)
        .map_err(|_| Error::InvalidInput(format!("{name} must be json or pretty: {v}")))
}
