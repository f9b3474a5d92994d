use thiserror::Error;

/// Errors returned by the Spotify accounts and Web API endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Spotify answered with a non-success status
    #[error("Spotify returned {status}: {message}")]
    Status { status: u16, message: String },

    /// A success response could not be decoded
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A configured base URL or redirect URI is not a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status carried by the error, if Spotify answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for Spotify API operations
pub type Result<T> = std::result::Result<T, ApiError>;
