#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    #[error("config: {0}")]
    Config(String),

    #[error("model {path}: {source}")]
    Model { path: String, source: ModelError },

    #[error("bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },

    #[error("serve: {0}")]
    Serve(#[from] std::io::Error),

    #[error("server task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Why a model file cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("cannot read: {0}")]
    Read(std::io::Error),

    #[error("bad model JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model has no features")]
    NoFeatures,

    #[error("{weights} weights for {features} features")]
    ShapeMismatch { weights: usize, features: usize },

    #[error("model coefficients must be finite")]
    NonFinite,
}

/// Why a `/predict` request is rejected with 400.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("body is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Reading(#[from] fogrelay_api::ReadingError),
}
