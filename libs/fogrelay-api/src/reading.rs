use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reasons a payload does not form a usable [`Reading`].
#[derive(Debug, thiserror::Error)]
pub enum ReadingError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing feature '{0}'")]
    MissingFeature(String),

    #[error("feature '{name}' is not numeric: {value}")]
    NonNumericFeature { name: String, value: Value },
}

/// State of the producer send timestamp carried by a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum SendTimestamp {
    Absent,
    Valid(f64),
    /// Present but unusable (not a number, or not positive).
    Invalid(Value),
}

impl SendTimestamp {
    pub fn secs(&self) -> Option<f64> {
        match self {
            SendTimestamp::Valid(t) => Some(*t),
            _ => None,
        }
    }
}

/// One sensor sample: named numeric features plus an optional send timestamp.
///
/// Serializes as the bare JSON object, so it can be forwarded unchanged as a
/// request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(Map<String, Value>);

impl Reading {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a JSON document that must be an object.
    pub fn parse(s: &str) -> Result<Self, ReadingError> {
        match serde_json::from_str::<Value>(s)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ReadingError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    /// Look up the send timestamp stored under `field`.
    ///
    /// Zero and negative values count as invalid: a producer clock cannot
    /// legitimately report them.
    pub fn send_timestamp(&self, field: &str) -> SendTimestamp {
        match self.0.get(field) {
            None | Some(Value::Null) => SendTimestamp::Absent,
            Some(v) => match v.as_f64() {
                Some(t) if t > 0.0 && t.is_finite() => SendTimestamp::Valid(t),
                _ => SendTimestamp::Invalid(v.clone()),
            },
        }
    }

    /// Verify every named feature is present and numeric.
    pub fn check_features<S: AsRef<str>>(&self, names: &[S]) -> Result<(), ReadingError> {
        for name in names {
            self.feature(name.as_ref())?;
        }
        Ok(())
    }

    /// Collect the named features, in order, as a dense vector.
    pub fn feature_vector<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<f64>, ReadingError> {
        names.iter().map(|n| self.feature(n.as_ref())).collect()
    }

    fn feature(&self, name: &str) -> Result<f64, ReadingError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| ReadingError::MissingFeature(name.to_string()))?;
        value.as_f64().ok_or_else(|| ReadingError::NonNumericFeature {
            name: name.to_string(),
            value: value.clone(),
        })
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
