use serde::{Deserialize, Serialize};

/// Success body of `POST /predict` on the edge node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Estimated blood glucose level, rounded to two decimals.
    pub glucose_prediction: f64,
    /// Model inference time measured on the server, in seconds.
    pub latency_seconds: f64,
}

/// Failure body returned by the edge node with a 4xx status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
