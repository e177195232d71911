use thiserror::Error;

pub type GawResult<T> = std::result::Result<T, GawError>;

/// Faults inside the plugin. Every variant is recoverable at the pipeline
/// boundary by serving the origin page unmodified.
#[derive(Debug, Error)]
pub enum GawError {
    /// A cache is enabled but its KV namespace is not bound to the Worker.
    #[error("KV binding `{0}` is not configured")]
    MissingBinding(&'static str),

    #[error("KV operation failed: {0}")]
    Kv(String),

    #[error("origin fetch failed: {0}")]
    Origin(String),

    #[error("HTML transform failed: {0}")]
    Transform(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] http::Error),

    #[error("worker runtime error: {0}")]
    Worker(String),
}

impl From<worker::Error> for GawError {
    fn from(err: worker::Error) -> Self {
        GawError::Worker(err.to_string())
    }
}

impl From<GawError> for worker::Error {
    fn from(err: GawError) -> Self {
        worker::Error::RustError(err.to_string())
    }
}
