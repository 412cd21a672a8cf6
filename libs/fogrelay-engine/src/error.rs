use std::time::Duration;

/// Failure of a single call to the prediction service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("connect: {0}")]
    Connect(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport: {0}")]
    Transport(String),
}

/// Terminal failure of one relay invocation.
///
/// Every variant is built at the step that detected it. None of them is
/// retried by the relay, except `DownstreamUnavailable` when a retry policy
/// is configured.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("payload is not valid UTF-8: {source}")]
    DecodeFailure { source: std::str::Utf8Error },

    #[error("malformed payload ({reason}): {raw}")]
    MalformedPayload { raw: String, reason: String },

    #[error("prediction service unavailable after {attempts} attempt(s): {cause}")]
    DownstreamUnavailable { cause: ServiceError, attempts: u32 },

    #[error("invalid prediction response ({reason}): {body}")]
    InvalidPredictionResponse { body: String, reason: String },

    #[error("invocation cancelled by host")]
    Cancelled,
}

impl RelayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RelayError::DecodeFailure { .. } => FailureKind::DecodeFailure,
            RelayError::MalformedPayload { .. } => FailureKind::MalformedPayload,
            RelayError::DownstreamUnavailable { .. } => FailureKind::DownstreamUnavailable,
            RelayError::InvalidPredictionResponse { .. } => FailureKind::InvalidPredictionResponse,
            RelayError::Cancelled => FailureKind::Cancelled,
        }
    }

    pub(crate) fn malformed(raw: &str, reason: impl std::fmt::Display) -> Self {
        RelayError::MalformedPayload {
            raw: raw.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_response(body: &[u8], reason: impl std::fmt::Display) -> Self {
        RelayError::InvalidPredictionResponse {
            body: String::from_utf8_lossy(body).into_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Field-less tag of a [`RelayError`], used in telemetry and dead letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    DecodeFailure,
    MalformedPayload,
    DownstreamUnavailable,
    InvalidPredictionResponse,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::DecodeFailure => "decode_failure",
            FailureKind::MalformedPayload => "malformed_payload",
            FailureKind::DownstreamUnavailable => "downstream_unavailable",
            FailureKind::InvalidPredictionResponse => "invalid_prediction_response",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building a relay from configuration.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("http client: {0}")]
    Client(String),

    #[error("io error ({path}): {source}")]
    Io { path: String, source: std::io::Error },
}
