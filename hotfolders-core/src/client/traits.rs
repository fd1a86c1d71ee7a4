//! Trait for conversion service implementations

use super::errors::{ClientError, SubmitError};
use super::types::{Artifact, JobHandle, JobStatus, Upload};
use async_trait::async_trait;
use std::path::Path;

/// The three remote operations a conversion job needs.
///
/// Implementations keep no per-job state; every call stands alone.
#[async_trait]
pub trait ConversionClient: Send + Sync {
    /// Get the name of this service
    fn name(&self) -> &str;

    /// Upload a source file and request conversion to `target_format`
    async fn submit(&self, upload: Upload, target_format: &str) -> Result<JobHandle, SubmitError>;

    /// Ask for the current status of a job. One remote round trip per call.
    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, ClientError>;

    /// Stream an artifact to `destination`.
    ///
    /// On success `destination` holds the complete artifact, replacing any
    /// placeholder there; on failure it is left as it was. Returns the number
    /// of bytes written.
    async fn download(&self, artifact: &Artifact, destination: &Path) -> Result<u64, ClientError>;
}
