use serde::Serialize;
use serde_json::Value;

use crate::error::RelayError;

/// Decoded answer of the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// The prediction scalar.
    pub value: f64,
    /// Processing time the service measured itself, when it reported one.
    pub server_latency_secs: Option<f64>,
    /// Full response document.
    pub body: Value,
}

/// Decode a success body into a [`Prediction`].
///
/// A body that is not a JSON object, or lacks a numeric `prediction_key`,
/// is an invalid response. A missing or non-numeric latency is tolerated.
pub(crate) fn decode_prediction(
    body: &[u8],
    prediction_key: &str,
    latency_key: &str,
) -> Result<Prediction, RelayError> {
    let doc: Value = serde_json::from_slice(body).map_err(|e| RelayError::invalid_response(body, e))?;
    let obj = doc
        .as_object()
        .ok_or_else(|| RelayError::invalid_response(body, "expected a JSON object"))?;
    let value = match obj.get(prediction_key) {
        Some(v) => v.as_f64().ok_or_else(|| {
            RelayError::invalid_response(body, format!("'{prediction_key}' is not numeric"))
        })?,
        None => return Err(RelayError::invalid_response(body, format!("missing '{prediction_key}'"))),
    };
    let server_latency_secs = obj.get(latency_key).and_then(Value::as_f64);

    Ok(Prediction {
        value,
        server_latency_secs,
        body: doc,
    })
}
