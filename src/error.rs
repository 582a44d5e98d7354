use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    #[error("decode failure: {0}")]
    Decode(String),

    /// The consumer went away or the session was cancelled.
    #[error("stream terminated")]
    StreamTerminated,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn invalid_period(name: &str, period: usize) -> Self {
        AppError::InvalidConfiguration(format!("{} period must be > 0 (got {})", name, period))
    }
}
