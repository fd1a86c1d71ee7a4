//! Error types for conversion service operations

use super::types::RemoteError;
use thiserror::Error;

/// Transport and protocol errors from poll and download calls
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network error occurred
    #[error("Network error: {message}")]
    Network { message: String },

    /// API returned an error status
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("Parsing error: {message}")]
    Parse { message: String },

    /// Local file IO failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse {
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

/// The service did not accept a job.
///
/// `errors` carries every structured error the service returned, which is
/// empty when the request never got an answer.
#[derive(Debug, Clone, Error)]
#[error("Submission rejected: {reason}")]
pub struct SubmitError {
    pub reason: String,
    pub errors: Vec<RemoteError>,
}

impl SubmitError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(reason: impl Into<String>, errors: Vec<RemoteError>) -> Self {
        Self {
            reason: reason.into(),
            errors,
        }
    }
}

impl From<ClientError> for SubmitError {
    fn from(err: ClientError) -> Self {
        Self::new(err.to_string())
    }
}
