//! Drives one source file through every configured target format

use super::archive;
use super::{
    ConversionError, ConversionJob, ConversionOutcome, Delivered, Extraction, FormatResult,
    JobState, RemoveFile, SourceCleanup, SourceDisposition, Timing,
};
use crate::client::{Artifact, ConversionClient, JobHandle, JobStatus, Upload};
use crate::config::WatchConfig;
use crate::ignore_registry::IgnoreRegistry;
use crate::monitor::matcher;
use crate::naming::{self, NameResolver};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{Instant, sleep};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};
use uuid::Uuid;

/// Converts files for one watched directory
pub struct JobOrchestrator {
    client: Arc<dyn ConversionClient>,
    watch: Arc<WatchConfig>,
    ignored: Arc<IgnoreRegistry>,
    names: Arc<NameResolver>,
    timing: Timing,
    cleanup: Arc<dyn SourceCleanup>,
}

impl JobOrchestrator {
    pub fn new(
        client: Arc<dyn ConversionClient>,
        watch: Arc<WatchConfig>,
        ignored: Arc<IgnoreRegistry>,
    ) -> Self {
        Self {
            client,
            watch,
            ignored,
            names: Arc::new(NameResolver::new()),
            timing: Timing::default(),
            cleanup: Arc::new(RemoveFile),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Share a name resolver with other orchestrators writing to the same directories
    pub fn with_names(mut self, names: Arc<NameResolver>) -> Self {
        self.names = names;
        self
    }

    pub fn with_cleanup(mut self, cleanup: Arc<dyn SourceCleanup>) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn watch(&self) -> &WatchConfig {
        &self.watch
    }

    /// Whether `path` is excluded by the watch's ignore list or the ignore registry
    pub fn is_ignored(&self, path: &Path) -> bool {
        matcher::is_ignored(path, &self.watch.ignore_patterns, &*self.ignored)
    }

    /// Convert `source` to every target format and settle its fate.
    ///
    /// Never fails: per-format errors are logged and folded into the outcome.
    pub async fn process(&self, source: &Path) -> ConversionOutcome {
        let span = info_span!("conversion", run = %Uuid::new_v4(), source = %source.display());
        self.run(source).instrument(span).await
    }

    async fn run(&self, source: &Path) -> ConversionOutcome {
        let mut outcome = ConversionOutcome::new(source);

        if self.is_ignored(source) {
            debug!("Source is ignored, skipping");
            return outcome;
        }

        if !self.timing.settle_delay.is_zero() {
            sleep(self.timing.settle_delay).await;
        }

        for format in &self.watch.target_formats {
            if self.is_ignored(source) {
                debug!("Source became ignored, not converting to {}", format);
                break;
            }

            let mut job = ConversionJob::new(source, format.as_str());
            let result = self.drive(&mut job).await;
            report(&job, &result);

            outcome.results.push(FormatResult {
                target_format: job.target_format,
                remote_job_id: job.remote_job_id,
                result,
            });
        }

        outcome.disposition = if outcome.results.is_empty() {
            SourceDisposition::Skipped
        } else if outcome.succeeded() {
            self.dispose(source).await
        } else {
            warn!("No conversion succeeded, keeping source");
            SourceDisposition::Retained
        };

        outcome
    }

    /// Run one job to a terminal state
    async fn drive(&self, job: &mut ConversionJob) -> Result<Delivered, ConversionError> {
        let result = self.advance(job).await;

        if result.is_err() && !job.state().is_terminal() {
            if let Err(e) = job.transition(JobState::Failed) {
                debug!("{}", e);
            }
        }

        result
    }

    async fn advance(&self, job: &mut ConversionJob) -> Result<Delivered, ConversionError> {
        let upload = match Upload::open(&job.source_path).await {
            Ok(upload) => upload,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConversionError::SourceVanished {
                    path: job.source_path.clone(),
                });
            }
            Err(source) => {
                return Err(ConversionError::SourceUnreadable {
                    path: job.source_path.clone(),
                    source,
                });
            }
        };

        debug!("Submitting to {} for {}", self.client.name(), job.target_format);
        let handle = self.client.submit(upload, &job.target_format).await?;
        info!("Submitted job {} for {}", handle, job.target_format);
        job.remote_job_id = Some(handle.id.clone());
        job.transition(JobState::Polling)?;

        let artifacts = self.await_completion(&handle).await?;
        let artifact = artifacts.into_iter().next().ok_or(ConversionError::NoArtifacts)?;
        job.transition(JobState::Downloading)?;

        let dir = match job.source_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let (path, bytes) = self.download(job, &artifact, &dir).await?;

        let extraction = if self.watch.options.auto_extract_archive && archive::is_archive(&path) {
            job.transition(JobState::Extracting)?;
            match archive::extract_in_background(path.clone(), dir).await {
                Ok(entries) => {
                    info!("Extracted {} entries from {}", entries, path.display());
                    Extraction::Extracted(entries)
                }
                Err(e) => {
                    warn!("{}", e);
                    Extraction::Failed(e.to_string())
                }
            }
        } else {
            Extraction::NotRequested
        };

        job.transition(JobState::Succeeded)?;
        Ok(Delivered {
            path,
            bytes,
            extraction,
        })
    }

    /// Poll until the remote job reaches a terminal status.
    ///
    /// A failed poll is retried on the next interval; only
    /// `max_poll_errors` failures in a row abandon the job.
    async fn await_completion(&self, handle: &JobHandle) -> Result<Vec<Artifact>, ConversionError> {
        let started = Instant::now();
        let mut failures: u32 = 0;

        loop {
            match self.client.poll(handle).await {
                Ok(JobStatus::Succeeded(artifacts)) => return Ok(artifacts),
                Ok(JobStatus::Failed { reason, code }) => {
                    return Err(ConversionError::RemoteJobFailed { reason, code });
                }
                Ok(JobStatus::Running) => {
                    failures = 0;
                    trace!("Job {} still running", handle);
                }
                Err(source) => {
                    failures += 1;
                    if failures >= self.timing.max_poll_errors.max(1) {
                        return Err(ConversionError::Poll {
                            attempts: failures,
                            source,
                        });
                    }
                    warn!("Polling job {} failed ({} in a row): {}", handle, failures, source);
                }
            }

            if let Some(limit) = self.timing.poll_timeout {
                if started.elapsed() >= limit {
                    return Err(ConversionError::PollTimeout { after: limit });
                }
            }

            sleep(self.timing.poll_interval).await;
        }
    }

    /// Reserve a free name in `dir` and download into it
    async fn download(
        &self,
        job: &ConversionJob,
        artifact: &Artifact,
        dir: &Path,
    ) -> Result<(PathBuf, u64), ConversionError> {
        let proposed =
            naming::artifact_file_name(&artifact.name, &job.source_path, &job.target_format);

        let reservation = self
            .names
            .reserve(&proposed, dir)
            .await
            .map_err(|source| ConversionError::Naming {
                dir: dir.to_path_buf(),
                source,
            })?;

        debug!("Downloading {} to {}", artifact.name, reservation.path().display());
        let bytes = self
            .client
            .download(artifact, reservation.path())
            .await
            .map_err(ConversionError::Download)?;

        Ok((reservation.keep(), bytes))
    }

    async fn dispose(&self, source: &Path) -> SourceDisposition {
        match self.cleanup.remove(source).await {
            Ok(()) => {
                info!("Deleted source");
                SourceDisposition::Deleted
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Source already gone");
                SourceDisposition::Missing
            }
            Err(e) => {
                error!("Could not delete source: {}; ignoring it from now on", e);
                self.ignored.insert(source);
                SourceDisposition::Quarantined
            }
        }
    }
}

fn report(job: &ConversionJob, result: &Result<Delivered, ConversionError>) {
    match result {
        Ok(delivered) => info!(
            "Converted to {}: {} ({} bytes)",
            job.target_format,
            delivered.path.display(),
            delivered.bytes
        ),
        Err(ConversionError::Submit(e)) => {
            error!("Submission for {} failed: {}", job.target_format, e.reason);
            for remote in &e.errors {
                error!("{}", remote);
            }
        }
        Err(ConversionError::RemoteJobFailed { reason, code }) => match code {
            Some(code) => error!(
                "Conversion to {} failed: {} (code {})",
                job.target_format, reason, code
            ),
            None => error!("Conversion to {} failed: {}", job.target_format, reason),
        },
        Err(e) => error!("Conversion to {} failed: {}", job.target_format, e),
    }
}
