use std::time::Duration;

use serde::Deserialize;

use fogrelay_api::TIMESTAMP_SENT;

use crate::error::EngineError;
use crate::retry::RetryPolicy;

/// What happens to a message whose invocation failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and forget the message.
    #[default]
    Drop,
    /// Log the failure and append the message to the dead-letter file.
    #[serde(alias = "dead-letter")]
    DeadLetter,
}

/// `[relay]` section of the host configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Prediction endpoint, e.g. `http://127.0.0.1:5000/predict`.
    pub endpoint: String,

    /// Bound on one downstream call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Response field holding the prediction scalar.
    #[serde(default = "default_prediction_key")]
    pub prediction_key: String,

    /// Response field holding the server-measured latency, in seconds.
    #[serde(default = "default_server_latency_key")]
    pub server_latency_key: String,

    /// Features that must be present and numeric. Empty disables the check.
    #[serde(default)]
    pub required_features: Vec<String>,

    /// Field carrying the producer send timestamp.
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,

    #[serde(default)]
    pub on_failure: FailurePolicy,

    /// Required when `on_failure = "dead_letter"`.
    #[serde(default)]
    pub dead_letter_path: Option<String>,

    /// NDJSON metrics file. Tracing output is always on.
    #[serde(default)]
    pub metrics_path: Option<String>,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_timeout_ms() -> u64 {
    5000
}
fn default_prediction_key() -> String {
    "glucose_prediction".into()
}
fn default_server_latency_key() -> String {
    "latency_seconds".into()
}
fn default_timestamp_field() -> String {
    TIMESTAMP_SENT.into()
}

impl RelayConfig {
    /// Parse a standalone `[relay]` table body.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let cfg: Self = toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(EngineError::Config(format!(
                "relay.endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.timeout_ms == 0 {
            return Err(EngineError::Config("relay.timeout_ms must be greater than 0".into()));
        }
        if self.prediction_key.is_empty() {
            return Err(EngineError::Config("relay.prediction_key must not be empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::Config("relay.retry.max_attempts must be at least 1".into()));
        }
        if self.on_failure == FailurePolicy::DeadLetter && self.dead_letter_path.is_none() {
            return Err(EngineError::Config(
                "relay.on_failure = \"dead_letter\" requires relay.dead_letter_path".into(),
            ));
        }
        Ok(())
    }
}

/// Runtime knobs of a [`LatencyRelay`](crate::LatencyRelay).
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub prediction_key: String,
    pub server_latency_key: String,
    pub required_features: Vec<String>,
    pub timestamp_field: String,
    pub on_failure: FailurePolicy,
    pub retry: RetryPolicy,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            prediction_key: default_prediction_key(),
            server_latency_key: default_server_latency_key(),
            required_features: Vec::new(),
            timestamp_field: default_timestamp_field(),
            on_failure: FailurePolicy::Drop,
            retry: RetryPolicy::no_retry(),
        }
    }
}

impl From<&RelayConfig> for RelaySettings {
    fn from(cfg: &RelayConfig) -> Self {
        Self {
            prediction_key: cfg.prediction_key.clone(),
            server_latency_key: cfg.server_latency_key.clone(),
            required_features: cfg.required_features.clone(),
            timestamp_field: cfg.timestamp_field.clone(),
            on_failure: cfg.on_failure,
            retry: cfg.retry.clone(),
        }
    }
}
