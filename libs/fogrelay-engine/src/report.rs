use serde::Serialize;

use fogrelay_api::Reading;

use crate::prediction::Prediction;

/// Timeline of one successful invocation. All instants are Unix seconds.
///
/// Lives only for the duration of the invocation that created it.
#[derive(Debug, Clone)]
pub struct RelayEvent {
    pub reading: Reading,
    pub received_at: f64,
    pub call_start: f64,
    pub call_end: f64,
    pub prediction: Prediction,
    pub completed_at: f64,
    /// Producer send time, when the reading carried a usable one.
    pub timestamp_sent: Option<f64>,
    pub attempts: u32,
}

/// Latency figures derived from a [`RelayEvent`], in milliseconds.
///
/// Values are not clamped: a negative figure means the clocks involved
/// disagree and is reported as observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyReport {
    pub total_relay_latency_ms: f64,
    pub downstream_call_latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_to_end_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_latency_ms: Option<f64>,
    pub attempts: u32,
}

impl LatencyReport {
    pub fn from_event(event: &RelayEvent) -> Self {
        Self {
            total_relay_latency_ms: (event.completed_at - event.received_at) * 1000.0,
            downstream_call_latency_ms: (event.call_end - event.call_start) * 1000.0,
            end_to_end_latency_ms: event.timestamp_sent.map(|sent| (event.completed_at - sent) * 1000.0),
            server_latency_ms: event.prediction.server_latency_secs.map(|s| s * 1000.0),
            attempts: event.attempts,
        }
    }
}
