//! Failures local to platform calls and their mapping into [`CoordinationError`].

use coordination::CoordinationError;
use thiserror::Error;

/// Failures talking to the external platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("invalid platform base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} answered with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl From<PlatformError> for CoordinationError {
    fn from(err: PlatformError) -> Self {
        CoordinationError::Platform {
            message: err.to_string(),
        }
    }
}
