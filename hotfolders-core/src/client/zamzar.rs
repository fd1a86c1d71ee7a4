//! Zamzar conversion service client
//!
//! Talks to the Zamzar v1 REST API: multipart job submission, job status
//! polling and artifact download. Every request authenticates with the API
//! key as the basic-auth user and an empty password.

use super::download::write_atomically;
use super::errors::{ClientError, SubmitError};
use super::traits::ConversionClient;
use super::types::{Artifact, JobHandle, JobStatus, RemoteError, Upload};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

pub const PRODUCTION_BASE_URL: &str = "https://api.zamzar.com/v1";

/// Transport configuration for the Zamzar client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZamzarConfig {
    pub base_url: String,
    /// Connect timeout for every request and total timeout for status polls
    pub timeout_secs: u64,
}

impl Default for ZamzarConfig {
    fn default() -> Self {
        Self {
            base_url: PRODUCTION_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Zamzar-backed conversion client
pub struct ZamzarClient {
    client: Client,
    config: ZamzarConfig,
    api_key: String,
}

impl ZamzarClient {
    pub fn new(api_key: impl Into<String>, config: ZamzarConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ConversionClient for ZamzarClient {
    fn name(&self) -> &str {
        "zamzar"
    }

    async fn submit(&self, upload: Upload, target_format: &str) -> Result<JobHandle, SubmitError> {
        debug!("Submitting {} ({} bytes) for {}", upload.file_name, upload.len, target_format);

        let body = Body::wrap_stream(ReaderStream::new(upload.file));
        let part = Part::stream_with_length(body, upload.len)
            .file_name(upload.file_name);
        let form = Form::new()
            .text("target_format", target_format.to_string())
            .part("source_file", part);

        let response = self
            .client
            .post(self.url("jobs"))
            .basic_auth(&self.api_key, Some(""))
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::from)?;

        let status = response.status();
        let text = response.text().await.map_err(ClientError::from)?;
        trace!("Submit response ({}): {}", status, text);

        interpret_submission(status, &text)
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("jobs/{}", job.id)))
            .basic_auth(&self.api_key, Some(""))
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        trace!("Job {} status response ({}): {}", job.id, status, text);

        if !status.is_success() {
            return Err(ClientError::api(status.as_u16(), describe_errors(&text)));
        }

        interpret_status(&text)
    }

    async fn download(&self, artifact: &Artifact, destination: &Path) -> Result<u64, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("files/{}/content", artifact.id)))
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::api(status.as_u16(), describe_errors(&text)));
        }

        write_atomically(response.bytes_stream(), destination).await
    }
}

/// Job resource as returned by `POST /jobs` and `GET /jobs/{id}`
#[derive(Debug, Deserialize)]
struct JobResponse {
    id: Option<u64>,
    status: Option<String>,
    failure: Option<WireFailure>,
    #[serde(default)]
    target_files: Vec<WireFile>,
    #[serde(default)]
    errors: Vec<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct WireFailure {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    id: u64,
    name: String,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorsOnly {
    #[serde(default)]
    errors: Vec<RemoteError>,
}

fn interpret_submission(status: StatusCode, body: &str) -> Result<JobHandle, SubmitError> {
    let parsed: JobResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Err(SubmitError::new(format!(
                "unreadable response (status {}): {}",
                status.as_u16(),
                e
            )));
        }
    };

    match parsed.id {
        Some(id) if parsed.errors.is_empty() => Ok(JobHandle::new(id.to_string())),
        _ => Err(SubmitError::with_errors(
            format!("no job id returned (status {})", status.as_u16()),
            parsed.errors,
        )),
    }
}

fn interpret_status(body: &str) -> Result<JobStatus, ClientError> {
    let parsed: JobResponse = serde_json::from_str(body)?;
    let status = parsed.status.ok_or_else(|| ClientError::parse("job response has no status"))?;

    Ok(match status.as_str() {
        "successful" => JobStatus::Succeeded(
            parsed
                .target_files
                .into_iter()
                .map(|f| Artifact {
                    id: f.id.to_string(),
                    name: f.name,
                    size: f.size,
                })
                .collect(),
        ),
        "failed" | "cancelled" => {
            let (reason, code) = match parsed.failure {
                Some(failure) => (failure.message.unwrap_or_else(|| status.clone()), failure.code),
                None => (status.clone(), None),
            };
            JobStatus::Failed { reason, code }
        }
        _ => JobStatus::Running,
    })
}

fn describe_errors(body: &str) -> String {
    match serde_json::from_str::<ErrorsOnly>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => {
            parsed.errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
        }
        _ => body.chars().take(200).collect(),
    }
}
