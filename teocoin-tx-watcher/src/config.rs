use crate::error::WatchError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use teocoin_tx_logger::LogConfig;

/// The top-level configuration for the transaction watcher.
///
/// It is typically deserialized from a TOML file with [`load_config`] and its
/// sections handed to the [`StatusPoller`](crate::poller::StatusPoller),
/// [`HttpStatusLookup`](crate::lookup::HttpStatusLookup) and logger.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct WatcherConfig {
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Cadence and retry behaviour of a polling cycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PollerConfig {
    /// Milliseconds between two consecutive status queries.
    pub interval_ms: u64,
    /// Milliseconds after which an in-flight query is abandoned and counted as a failure.
    pub query_timeout_ms: u64,
    /// Whether the first query is issued right away or after one interval.
    pub immediate_first_query: bool,
    /// Give up after this many failed queries in a row. `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

/// Settings for the REST status endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Path appended to `base_url`; `{id}` is replaced by the transaction identifier.
    pub status_path: String,
    /// Sent as a bearer token when present.
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            query_timeout_ms: 3_000,
            immediate_first_query: true,
            max_consecutive_failures: None,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            status_path: "/api/v1/blockchain/transaction-status/{id}".to_string(),
            auth_token: None,
            request_timeout_secs: 10,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), WatchError> {
        if self.interval_ms == 0 {
            return Err(WatchError::Config("poller interval must be positive".to_string()));
        }
        if self.query_timeout_ms == 0 {
            return Err(WatchError::Config("query timeout must be positive".to_string()));
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(WatchError::Config(
                "max-consecutive-failures must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Loads the watcher configuration from a TOML file, overlaid with
/// `TEOCOIN__SECTION__KEY` environment variables.
pub fn load_config(path: &str) -> Result<WatcherConfig> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("TEOCOIN").separator("__"));

    let settings: WatcherConfig = builder
        .build()
        .context(format!("Failed to build configuration from '{}'", path))?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    settings
        .poller
        .validate()
        .context("Configuration failed validation")?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use teocoin_tx_logger::LogFormat;

    #[test]
    fn defaults_are_valid() {
        let config = WatcherConfig::default();
        assert!(config.poller.validate().is_ok());
        assert_eq!(config.poller.interval(), Duration::from_secs(3));
        assert!(config.poller.max_consecutive_failures.is_none());
        assert!(config.backend.status_path.contains("{id}"));
    }

    #[test]
    fn rejects_zero_interval() {
        let config = PollerConfig {
            interval_ms: 0,
            ..PollerConfig::default()
        };
        assert!(matches!(config.validate(), Err(WatchError::Config(_))));
    }

    #[test]
    fn rejects_zero_failure_budget() {
        let config = PollerConfig {
            max_consecutive_failures: Some(0),
            ..PollerConfig::default()
        };
        assert!(matches!(config.validate(), Err(WatchError::Config(_))));
    }

    #[test]
    fn loads_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[poller]
interval-ms = 500
max-consecutive-failures = 4

[backend]
base-url = "https://teocoin.example"
auth-token = "secret"

[log]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.poller.interval_ms, 500);
        assert_eq!(config.poller.query_timeout_ms, 3_000);
        assert!(config.poller.immediate_first_query);
        assert_eq!(config.poller.max_consecutive_failures, Some(4));
        assert_eq!(config.backend.base_url, "https://teocoin.example");
        assert_eq!(config.backend.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.backend.request_timeout_secs, 10);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[poller]\ninterval-ms = 0").unwrap();
        assert!(load_config(file.path().to_str().unwrap()).is_err());
    }
}
