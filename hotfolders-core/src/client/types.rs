//! Common types for conversion clients

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// Identifies a job accepted by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub id: String,
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// A finished output file held by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: String,
    /// Name suggested by the service, not trusted as a path
    pub name: String,
    pub size: Option<u64>,
}

impl Artifact {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size: None,
        }
    }
}

/// Status of a remote job as seen by one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Succeeded(Vec<Artifact>),
    Failed {
        reason: String,
        code: Option<i64>,
    },
}

/// Structured error reported by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error code: {} - {}", self.code, self.message)
    }
}

/// An opened source file ready to be sent
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub file: tokio::fs::File,
    pub len: u64,
}

impl Upload {
    /// Open `path` for upload. A missing file yields `ErrorKind::NotFound`.
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());

        Ok(Self {
            file_name,
            file,
            len,
        })
    }
}
