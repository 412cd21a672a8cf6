use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Mutex;

use serde_json::{Value, json};

use fogrelay_api::now_ms;

use crate::error::{EngineError, RelayError, ServiceError};
use crate::prediction::Prediction;
use crate::report::LatencyReport;

/// Receives the telemetry records of every invocation.
///
/// Calls happen inline on the invocation's task, so implementations must be
/// cheap and must not fail; they report their own problems via `tracing`.
pub trait RelayObserver: Send + Sync {
    fn on_received(&self, _bytes: usize) {}
    fn on_timestamp_rejected(&self, _value: &Value) {}
    fn on_failure(&self, _error: &RelayError) {}
    fn on_prediction(&self, _prediction: &Prediction) {}
    fn on_report(&self, _report: &LatencyReport) {}
}

// ═══════════════════════════════════════════════════════════════
//  Tracing
// ═══════════════════════════════════════════════════════════════

/// Emits every record through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RelayObserver for TracingObserver {
    fn on_received(&self, bytes: usize) {
        tracing::info!(bytes, "message received");
    }

    fn on_timestamp_rejected(&self, value: &Value) {
        tracing::warn!(%value, "unusable send timestamp, end-to-end latency omitted");
    }

    fn on_failure(&self, error: &RelayError) {
        let kind = error.kind();
        match error {
            RelayError::DecodeFailure { source } => {
                tracing::error!(%kind, error = %source, "failed to decode message as UTF-8");
            }
            RelayError::MalformedPayload { raw, reason } => {
                tracing::error!(%kind, %reason, raw = %raw, "malformed sensor payload");
            }
            RelayError::DownstreamUnavailable { cause, attempts } => {
                let timeout = matches!(cause, ServiceError::Timeout(_));
                tracing::error!(%kind, error = %cause, attempts, timeout, "failed to reach prediction service");
            }
            RelayError::InvalidPredictionResponse { body, reason } => {
                tracing::error!(%kind, %reason, body = %body, "invalid prediction response");
            }
            RelayError::Cancelled => {
                tracing::warn!(%kind, "invocation cancelled");
            }
        }
    }

    fn on_prediction(&self, prediction: &Prediction) {
        tracing::info!(
            prediction = prediction.value,
            server_latency_s = prediction.server_latency_secs,
            "edge node prediction"
        );
    }

    fn on_report(&self, report: &LatencyReport) {
        tracing::info!(
            total_relay_latency_ms = format_args!("{:.2}", report.total_relay_latency_ms),
            downstream_call_latency_ms = format_args!("{:.2}", report.downstream_call_latency_ms),
            end_to_end_latency_ms = report.end_to_end_latency_ms,
            server_latency_ms = report.server_latency_ms,
            attempts = report.attempts,
            "latency report"
        );
    }
}

// ═══════════════════════════════════════════════════════════════
//  NDJSON metrics file
// ═══════════════════════════════════════════════════════════════

/// Appends one JSON object per record to a metrics file.
///
/// Every line carries `ts_ms` and `event`; the rest depends on the event.
pub struct NdjsonObserver {
    path: String,
    out: Mutex<BufWriter<File>>,
}

impl NdjsonObserver {
    pub fn open(path: &str) -> Result<Self, EngineError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| EngineError::Io { path: path.to_string(), source })?;
        Ok(Self {
            path: path.to_string(),
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write(&self, event: &str, mut line: Value) {
        if let Value::Object(map) = &mut line {
            map.insert("ts_ms".into(), json!(now_ms()));
            map.insert("event".into(), json!(event));
        }
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let res = serde_json::to_writer(&mut *out, &line)
            .map_err(std::io::Error::from)
            .and_then(|_| out.write_all(b"\n"))
            .and_then(|_| out.flush());
        if let Err(e) = res {
            tracing::warn!(path = %self.path, error = %e, "metrics write failed");
        }
    }
}

impl RelayObserver for NdjsonObserver {
    fn on_received(&self, bytes: usize) {
        self.write("received", json!({ "bytes": bytes }));
    }

    fn on_timestamp_rejected(&self, value: &Value) {
        self.write("timestamp_rejected", json!({ "value": value }));
    }

    fn on_failure(&self, error: &RelayError) {
        self.write(
            "failure",
            json!({ "kind": error.kind().as_str(), "error": error.to_string() }),
        );
    }

    fn on_prediction(&self, prediction: &Prediction) {
        self.write(
            "prediction",
            json!({ "prediction": prediction.value, "server_latency_s": prediction.server_latency_secs }),
        );
    }

    fn on_report(&self, report: &LatencyReport) {
        let line = serde_json::to_value(report).unwrap_or_else(|_| json!({}));
        self.write("report", line);
    }
}
