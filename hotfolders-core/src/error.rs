//! Startup and session error types
//!
//! Errors that stop the process before or while sessions are brought up.
//! Per-conversion failures never surface here; see
//! [`crate::orchestrator::ConversionError`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, reported before any session starts
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Could not read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: io::Error,
    },

    /// The configuration file is not valid JSON or TOML for the expected shape
    #[error("Could not parse configuration file {path}: {message}")]
    Parse {
        path: PathBuf,
        message: String,
    },

    /// A watched directory does not exist
    #[error("{path} does not exist - cannot monitor")]
    MissingDirectory { path: PathBuf },

    /// A watch entry is structurally valid but unusable
    #[error("Invalid watch entry for {path}: {message}")]
    InvalidEntry {
        path: PathBuf,
        message: String,
    },

    /// Neither the file nor the environment provides an API key
    #[error("No API key configured: set `api_key` or the {env} environment variable")]
    MissingApiKey { env: &'static str },
}

impl ConfigError {
    /// Create a parse error
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a missing directory error
    pub fn missing_directory(path: impl Into<PathBuf>) -> Self {
        Self::MissingDirectory { path: path.into() }
    }

    /// Create an invalid entry error
    pub fn invalid_entry(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidEntry {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while starting watch sessions
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The notification backend refused to watch a directory
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },
}
