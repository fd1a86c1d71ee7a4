//! Mock conversion client for testing
//!
//! Scripts the remote service per target format and records every call.
//! It is not available in production builds.

#![cfg(test)]

use super::download::write_atomically;
use super::errors::{ClientError, SubmitError};
use super::traits::ConversionClient;
use super::types::{Artifact, JobHandle, JobStatus, RemoteError, Upload};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// What the fake service does for one target format
#[derive(Debug, Clone)]
pub enum Script {
    /// Refuse the submission with these remote errors
    Reject(Vec<RemoteError>),
    /// Report Running `running_polls` times, then succeed with one artifact
    Convert {
        running_polls: usize,
        artifact: Artifact,
        bytes: Vec<u8>,
    },
    /// Report Running `running_polls` times, then fail the job
    Fail {
        running_polls: usize,
        reason: String,
        code: i64,
    },
    /// Fail the first `failures` status polls, then succeed with one artifact
    Flaky {
        failures: usize,
        artifact: Artifact,
        bytes: Vec<u8>,
    },
    /// Succeed the job, then fail the download
    BrokenDownload { artifact: Artifact },
    /// Never leave the Running state
    Stall,
}

/// A recorded client call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Submit {
        file_name: String,
        target_format: String,
    },
    Poll {
        job: String,
    },
    Download {
        artifact: String,
        destination: PathBuf,
    },
}

struct Job {
    script: Script,
    polls: usize,
}

#[derive(Default)]
pub struct MockConversionClient {
    scripts: Mutex<HashMap<String, Script>>,
    jobs: Mutex<HashMap<String, Job>>,
    calls: Mutex<Vec<Call>>,
}

impl MockConversionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, target_format: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(target_format.to_string(), script);
        self
    }

    /// Convert to `target_format`, producing `artifact_name` with `bytes`
    pub fn converts(
        self,
        target_format: &str,
        artifact_name: &str,
        bytes: &[u8],
        running_polls: usize,
    ) -> Self {
        let artifact = Artifact::new(format!("file-{target_format}"), artifact_name);
        let script = Script::Convert {
            running_polls,
            artifact,
            bytes: bytes.to_vec(),
        };
        self.script(target_format, script)
    }

    /// Like [`converts`](Self::converts), after `failures` failed status polls
    pub fn flaky(self, target_format: &str, artifact_name: &str, failures: usize) -> Self {
        let artifact = Artifact::new(format!("file-{target_format}"), artifact_name);
        let script = Script::Flaky {
            failures,
            artifact,
            bytes: b"converted".to_vec(),
        };
        self.script(target_format, script)
    }

    pub fn rejects(self, target_format: &str, code: i64, message: &str) -> Self {
        self.script(target_format, Script::Reject(vec![RemoteError::new(code, message)]))
    }

    pub fn fails(self, target_format: &str, code: i64, reason: &str) -> Self {
        let script = Script::Fail {
            running_polls: 1,
            reason: reason.to_string(),
            code,
        };
        self.script(target_format, script)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Submit { .. })).count()
    }

    pub fn polls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Poll { .. })).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ConversionClient for MockConversionClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, upload: Upload, target_format: &str) -> Result<JobHandle, SubmitError> {
        self.record(Call::Submit {
            file_name: upload.file_name.clone(),
            target_format: target_format.to_string(),
        });

        let script = self.scripts.lock().unwrap().get(target_format).cloned();
        let script = match script {
            Some(Script::Reject(errors)) => {
                return Err(SubmitError::with_errors("no job id returned", errors));
            }
            Some(script) => script,
            None => {
                let errors = vec![RemoteError::new(101, "Unsupported format")];
                return Err(SubmitError::with_errors("no job id returned", errors));
            }
        };

        let mut jobs = self.jobs.lock().unwrap();
        let id = format!("job-{}", jobs.len() + 1);
        jobs.insert(id.clone(), Job { script, polls: 0 });
        Ok(JobHandle::new(id))
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, ClientError> {
        self.record(Call::Poll {
            job: job.id.clone(),
        });

        let mut jobs = self.jobs.lock().unwrap();
        let state = jobs
            .get_mut(&job.id)
            .ok_or_else(|| ClientError::api(404, format!("unknown job {}", job.id)))?;
        state.polls += 1;

        let status = match &state.script {
            Script::Convert {
                running_polls,
                artifact,
                ..
            } => {
                if state.polls <= *running_polls {
                    JobStatus::Running
                } else {
                    JobStatus::Succeeded(vec![artifact.clone()])
                }
            }
            Script::Fail {
                running_polls,
                reason,
                code,
            } => {
                if state.polls <= *running_polls {
                    JobStatus::Running
                } else {
                    JobStatus::Failed {
                        reason: reason.clone(),
                        code: Some(*code),
                    }
                }
            }
            Script::Flaky {
                failures, artifact, ..
            } => {
                if state.polls <= *failures {
                    return Err(ClientError::api(502, "Bad Gateway"));
                }
                JobStatus::Succeeded(vec![artifact.clone()])
            }
            Script::BrokenDownload { artifact } => JobStatus::Succeeded(vec![artifact.clone()]),
            Script::Stall => JobStatus::Running,
            Script::Reject(_) => unreachable!("rejected jobs are never created"),
        };
        Ok(status)
    }

    async fn download(&self, artifact: &Artifact, destination: &Path) -> Result<u64, ClientError> {
        self.record(Call::Download {
            artifact: artifact.id.clone(),
            destination: destination.to_path_buf(),
        });

        let bytes = {
            let jobs = self.jobs.lock().unwrap();
            jobs.values().find_map(|job| match &job.script {
                Script::Convert {
                    artifact: a, bytes, ..
                }
                | Script::Flaky {
                    artifact: a, bytes, ..
                } if a.id == artifact.id => Some(Ok(bytes.clone())),
                Script::BrokenDownload { artifact: a } if a.id == artifact.id => Some(Err(())),
                _ => None,
            })
        };

        match bytes {
            Some(Ok(bytes)) => {
                let (head, tail) = bytes.split_at(bytes.len() / 2);
                let chunks = vec![Ok::<_, io::Error>(head.to_vec()), Ok(tail.to_vec())];
                write_atomically(stream::iter(chunks), destination).await
            }
            Some(Err(())) => {
                let chunks = vec![
                    Ok(b"partial".to_vec()),
                    Err(io::Error::other("connection reset")),
                ];
                write_atomically(stream::iter(chunks), destination).await
            }
            None => Err(ClientError::api(404, format!("unknown file {}", artifact.id))),
        }
    }
}
