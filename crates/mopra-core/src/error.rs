use thiserror::Error;

/// Failures of a call to the Mopra backend
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request was superseded or stopped before it resolved
    #[error("Response stopped by user")]
    Cancelled,

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// A well-formed reply that reports failure
    #[error("{0}")]
    Backend(String),
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

/// Result type for backend calls
pub type ApiResult<T> = Result<T, ApiError>;
