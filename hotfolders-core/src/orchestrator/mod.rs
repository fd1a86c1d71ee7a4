//! Per-file conversion orchestration
//!
//! A qualifying file is converted to each configured target format in turn.
//! Every format runs its own small state machine:
//!
//! ```text
//! Submitting -> Polling -> Downloading -> (Extracting) -> Succeeded
//!      |            |            |
//!      +------------+------------+----> Failed
//! ```
//!
//! Failures stay inside the format that raised them; the aggregate
//! [`ConversionOutcome`] records what happened to every format and to the
//! source file itself.

pub mod archive;
pub mod runner;


pub use runner::JobOrchestrator;

use crate::client::{ClientError, SubmitError};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// State of one conversion job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitting,
    Polling,
    Downloading,
    Extracting,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn can_become(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Submitting, Polling)
                | (Submitting, Failed)
                | (Polling, Downloading)
                | (Polling, Failed)
                | (Downloading, Extracting)
                | (Downloading, Succeeded)
                | (Downloading, Failed)
                | (Extracting, Succeeded)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Invalid job transition from {from:?} to {to:?}")]
    InvalidTransition { from: JobState, to: JobState },
}

/// One source file converted to one target format
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source_path: PathBuf,
    pub target_format: String,
    pub remote_job_id: Option<String>,
    state: JobState,
}

impl ConversionJob {
    pub fn new(source_path: impl Into<PathBuf>, target_format: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_format: target_format.into(),
            remote_job_id: None,
            state: JobState::Submitting,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn transition(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_become(next) {
            return Err(JobError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Why a single target format did not produce an artifact
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Source {path} no longer exists")]
    SourceVanished { path: PathBuf },

    #[error("Could not open source {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        source: io::Error,
    },

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("Remote job failed: {reason}")]
    RemoteJobFailed {
        reason: String,
        code: Option<i64>,
    },

    /// Every status poll in a row failed, up to the tolerated limit
    #[error("Polling failed {attempts} times in a row: {source}")]
    Poll {
        attempts: u32,
        source: ClientError,
    },

    #[error("Remote job did not finish within {after:?}")]
    PollTimeout { after: Duration },

    #[error("Remote job finished without output files")]
    NoArtifacts,

    #[error("Could not choose a destination name in {dir}: {source}")]
    Naming {
        dir: PathBuf,
        source: io::Error,
    },

    #[error("Download failed: {0}")]
    Download(#[source] ClientError),

    #[error(transparent)]
    Job(#[from] JobError),
}

/// Result of archive extraction for a delivered artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    NotRequested,
    Extracted(usize),
    Failed(String),
}

/// An artifact written next to its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub path: PathBuf,
    pub bytes: u64,
    pub extraction: Extraction,
}

#[derive(Debug)]
pub struct FormatResult {
    pub target_format: String,
    pub remote_job_id: Option<String>,
    pub result: Result<Delivered, ConversionError>,
}

/// What became of the source file after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDisposition {
    /// Converted and removed
    Deleted,
    /// Converted, but already gone when removal was attempted
    Missing,
    /// No format succeeded; the source stays for a later event
    Retained,
    /// Converted but could not be removed; ignored from now on
    Quarantined,
    /// Ignored before any job started
    Skipped,
}

/// Aggregate over every target format for one source file
#[derive(Debug)]
pub struct ConversionOutcome {
    pub source: PathBuf,
    pub results: Vec<FormatResult>,
    pub disposition: SourceDisposition,
}

impl ConversionOutcome {
    fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            results: Vec::new(),
            disposition: SourceDisposition::Skipped,
        }
    }

    /// True if at least one format delivered an artifact
    pub fn succeeded(&self) -> bool {
        self.results.iter().any(|r| r.result.is_ok())
    }

    pub fn delivered(&self) -> impl Iterator<Item = &Delivered> {
        self.results.iter().filter_map(|r| r.result.as_ref().ok())
    }
}

/// Waits applied by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause after the triggering event so the file can finish arriving
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    /// Give up on a remote job after this long; `None` waits forever
    pub poll_timeout: Option<Duration>,
    /// Consecutive failed status polls tolerated before the job is abandoned
    pub max_poll_errors: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            poll_interval: Duration::from_secs(1),
            poll_timeout: None,
            max_poll_errors: 5,
        }
    }
}

impl Timing {
    /// No waits at all
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Removes a source file once it has been converted
#[async_trait]
pub trait SourceCleanup: Send + Sync {
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Deletes the file from disk
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveFile;

#[async_trait]
impl SourceCleanup for RemoveFile {
    async fn remove(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}
