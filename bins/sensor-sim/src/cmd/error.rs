#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("{0}")]
    Config(String),

    #[error("dataset {path}: {source}")]
    Dataset { path: String, source: csv::Error },

    #[error("[{sink}] {detail}")]
    Send { sink: String, detail: String },
}
