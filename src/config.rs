//! Layered dashboard settings.
//!
//! Settings are resolved from, in increasing priority:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config PATH`, or `gridwatch.toml` in the working directory if present)
//! 3. `GRIDWATCH_*` environment variables (e.g. `GRIDWATCH_DER_NAME=Wissington`)
//! 4. Command line flags, applied by the binary
//!
//! ```toml
//! der_name = "Wissington"
//! poll_interval = "30s"
//! top_n = 10
//! warning_utilisation = 0.9
//! ```
//!
//! The portal API key is not part of these layers. It is read
//! from `ODP_API_KEY` only, after `.env` has been loaded.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use gridwatch_odp::{FetchError, FetchQuery, OdpClient, RetryPolicy, DEFAULT_ENDPOINT};
use serde::Deserialize;
use thiserror::Error;

use crate::data::duration::parse_duration;
use crate::data::Thresholds;

/// Environment variable holding the portal API key.
pub const API_KEY_VAR: &str = "ODP_API_KEY";

/// Where batches are recorded unless configured otherwise.
pub const DEFAULT_CSV_PATH: &str = "data/output/constraint_monitoring.csv";

/// Errors resolving settings at startup. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ODP_API_KEY is not set; add it to a .env file or the environment")]
    MissingApiKey,

    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            message: message.into(),
        }
    }
}

/// The portal API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Read the key from `ODP_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_value(std::env::var(API_KEY_VAR).ok())
    }

    /// Validate a key value. Missing and blank keys are rejected.
    pub fn from_value(value: Option<String>) -> Result<Self, ConfigError> {
        match value.map(|v| v.trim().to_string()) {
            Some(key) if !key.is_empty() => Ok(Self(key)),
            _ => Err(ConfigError::MissingApiKey),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Settings as they appear in files and the environment.
#[derive(Debug, Deserialize)]
struct RawSettings {
    endpoint: String,
    #[serde(default)]
    der_name: Option<String>,
    poll_interval: String,
    request_timeout: String,
    failure_threshold: u32,
    top_n: usize,
    max_history: usize,
    warning_utilisation: f64,
    critical_utilisation: f64,
    record_csv: bool,
    csv_path: PathBuf,
    log_file: PathBuf,
    retry_attempts: usize,
    retry_backoff: String,
}

/// Resolved and validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    /// Only show constraints for this DER site.
    pub der_name: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Consecutive failed fetches tolerated before the dashboard shows an error.
    pub failure_threshold: u32,
    /// Constraints plotted on the chart.
    pub top_n: usize,
    /// Points kept per constraint.
    pub max_history: usize,
    pub thresholds: Thresholds,
    pub record_csv: bool,
    pub csv_path: PathBuf,
    pub log_file: PathBuf,
    pub retry: RetryPolicy,
}

impl Settings {
    /// Resolve settings from defaults, the settings file and the environment.
    ///
    /// An explicitly given file must exist. Without one, `gridwatch.toml` is
    /// used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = defaults()?;
        let builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name("gridwatch").required(false)),
        };
        let config = builder
            .add_source(Environment::with_prefix("GRIDWATCH"))
            .build()?;
        Self::from_config(config)
    }

    /// Settings from built-in defaults only.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_config(defaults()?.build()?)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let raw: RawSettings = config.try_deserialize()?;
        Self::validate(raw)
    }

    fn validate(raw: RawSettings) -> Result<Self, ConfigError> {
        let poll_interval = duration("poll_interval", &raw.poll_interval)?;
        if poll_interval.is_zero() {
            return Err(ConfigError::invalid("poll_interval", "must be greater than zero"));
        }
        let request_timeout = duration("request_timeout", &raw.request_timeout)?;
        if request_timeout.is_zero() {
            return Err(ConfigError::invalid("request_timeout", "must be greater than zero"));
        }
        let retry_backoff = duration("retry_backoff", &raw.retry_backoff)?;

        if raw.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("endpoint", "must not be empty"));
        }
        if raw.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold", "must be at least 1"));
        }
        if raw.top_n == 0 {
            return Err(ConfigError::invalid("top_n", "must be at least 1"));
        }
        if raw.max_history == 0 {
            return Err(ConfigError::invalid("max_history", "must be at least 1"));
        }
        if raw.retry_attempts == 0 {
            return Err(ConfigError::invalid("retry_attempts", "must be at least 1"));
        }
        if !(raw.warning_utilisation > 0.0 && raw.warning_utilisation <= raw.critical_utilisation) {
            return Err(ConfigError::invalid(
                "warning_utilisation",
                format!(
                    "must be positive and not above critical_utilisation ({})",
                    raw.critical_utilisation
                ),
            ));
        }

        let der_name = raw.der_name.as_deref().and_then(der_filter);

        Ok(Self {
            endpoint: raw.endpoint,
            der_name,
            poll_interval,
            request_timeout,
            failure_threshold: raw.failure_threshold,
            top_n: raw.top_n,
            max_history: raw.max_history,
            thresholds: Thresholds {
                warning: raw.warning_utilisation,
                critical: raw.critical_utilisation,
            },
            record_csv: raw.record_csv,
            csv_path: raw.csv_path,
            log_file: raw.log_file,
            retry: RetryPolicy {
                max_attempts: raw.retry_attempts,
                base_backoff: retry_backoff,
            },
        })
    }

    /// Build a portal client for these settings.
    pub fn client(&self, key: &ApiKey) -> Result<OdpClient, FetchError> {
        OdpClient::builder()
            .endpoint(&self.endpoint)
            .api_key(key.expose())
            .timeout(self.request_timeout)
            .retry(self.retry)
            .build()
    }

    /// The query sent on every poll.
    pub fn query(&self) -> FetchQuery {
        match &self.der_name {
            Some(name) => FetchQuery::new().der_name(name),
            None => FetchQuery::new(),
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("endpoint", DEFAULT_ENDPOINT)?
        .set_default("poll_interval", "30s")?
        .set_default("request_timeout", "10s")?
        .set_default("failure_threshold", 3i64)?
        .set_default("top_n", 10i64)?
        .set_default("max_history", 60i64)?
        .set_default("warning_utilisation", 0.9)?
        .set_default("critical_utilisation", 1.0)?
        .set_default("record_csv", true)?
        .set_default("csv_path", DEFAULT_CSV_PATH)?
        .set_default("log_file", "gridwatch.log")?
        .set_default("retry_attempts", 3i64)?
        .set_default("retry_backoff", "500ms")
}

fn duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|e| ConfigError::invalid(key, e.to_string()))
}

/// Normalise a DER site name. Blank means no filter.
pub fn der_filter(name: &str) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
