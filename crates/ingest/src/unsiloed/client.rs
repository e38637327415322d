//! Parse job submission and status polling.
//!
//! Provides [`ParseJobClient`], which uploads a document to the `/parse`
//! endpoint, polls `/parse/{job_id}` at a fixed interval until the job
//! reaches a terminal status, and returns the raw JSON result. Polling is
//! bounded by a maximum wait so a stuck job surfaces as
//! [`ParseJobError::Timeout`] instead of blocking forever.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use moss_core::config::{Config, UnsiloedConfig};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, warn};

const STATUS_SUCCEEDED: &str = "Succeeded";
const STATUS_FAILED: &str = "Failed";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParseJobError {
    /// The document to upload does not exist.
    #[error("No file found at {}", .0.display())]
    InputNotFound(PathBuf),

    /// A required setting (the API key) is not configured.
    #[error("Missing configuration: {0} is not set")]
    ConfigMissing(String),

    /// The provider accepted the upload but returned no job id.
    #[error("Failed to create parse job: {0}")]
    MissingJobId(String),

    /// The provider reported the job as failed.
    #[error("Parse job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// The job did not reach a terminal status within the allowed wait.
    #[error("Parse job {job_id} still running after {waited_secs}s")]
    Timeout { job_id: String, waited_secs: u64 },

    /// Non-success HTTP status from the provider.
    #[error("HTTP {status}: {body}")]
    Transport { status: StatusCode, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A job accepted by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedJob {
    pub job_id: String,
    pub quota_remaining: Option<Value>,
}

/// Status of a job as of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Queued or processing; carries the provider's status label.
    Pending(String),
    /// Finished; carries the full result body.
    Succeeded(Value),
    /// Finished unsuccessfully; carries the provider's message.
    Failed(String),
}

impl JobStatus {
    fn from_body(body: Value) -> Self {
        match body.get("status").and_then(Value::as_str) {
            Some(STATUS_SUCCEEDED) => JobStatus::Succeeded(body),
            Some(STATUS_FAILED) => JobStatus::Failed(
                body.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
            ),
            Some(other) => JobStatus::Pending(other.to_string()),
            None => JobStatus::Pending("unknown".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for the layout-parsing job API.
pub struct ParseJobClient {
    http: Client,
    base_url: String,
    api_key: String,
    segmentation_method: String,
    ocr_mode: String,
    ocr_engine: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ParseJobClient {
    /// Build a client from configuration.
    ///
    /// Returns [`ParseJobError::ConfigMissing`] when no API key is configured.
    pub fn new(config: &UnsiloedConfig) -> Result<Self, ParseJobError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ParseJobError::ConfigMissing("UNSILOED_API_KEY".to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!(
            base_url = %config.base_url,
            poll_interval_secs = config.poll_interval_secs,
            max_wait_secs = config.max_wait_secs,
            "ParseJobClient initialised"
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            segmentation_method: config.segmentation_method.clone(),
            ocr_mode: config.ocr_mode.clone(),
            ocr_engine: config.ocr_engine.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
        })
    }

    /// Build a client from the full configuration, rejecting the sample
    /// placeholder key.
    pub fn from_config(config: &Config) -> Result<Self, ParseJobError> {
        config
            .require_unsiloed_key()
            .map_err(|_| ParseJobError::ConfigMissing("UNSILOED_API_KEY".to_string()))?;
        Self::new(&config.unsiloed)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Submit `path`, wait for the job, and return the raw result body.
    pub async fn parse_file(&self, path: &Path) -> Result<Value, ParseJobError> {
        let job = self.submit(path).await?;
        self.wait_for_completion(&job.job_id).await
    }

    /// Upload a document and start a parse job.
    pub async fn submit(&self, path: &Path) -> Result<SubmittedJob, ParseJobError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ParseJobError::InputNotFound(path.to_path_buf()));
        }

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();

        info!(path = %path.display(), bytes = bytes.len(), "Submitting parse job");

        let form = Form::new()
            .text("segmentation_method", self.segmentation_method.clone())
            .text("OCR_Mode", self.ocr_mode.clone())
            .text("ocr_engine", self.ocr_engine.clone())
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("application/pdf")?,
            );

        let resp = self
            .http
            .post(format!("{}/parse", self.base_url))
            .header("accept", "application/json")
            .header("api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;
        let body = read_json(resp).await?;

        let job_id = match body.get("job_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("no job_id in response")
                    .to_string();
                error!(message = %message, "Parse job was not created");
                return Err(ParseJobError::MissingJobId(message));
            }
        };

        let quota_remaining = body.get("quota_remaining").cloned();
        info!(
            job_id = %job_id,
            quota_remaining = ?quota_remaining,
            "Parse job created"
        );

        Ok(SubmittedJob {
            job_id,
            quota_remaining,
        })
    }

    /// Fetch the current status of a job once.
    pub async fn poll(&self, job_id: &str) -> Result<JobStatus, ParseJobError> {
        let resp = self
            .http
            .get(format!("{}/parse/{}", self.base_url, job_id))
            .header("accept", "application/json")
            .header("api-key", &self.api_key)
            .send()
            .await?;
        let body = read_json(resp).await?;
        Ok(JobStatus::from_body(body))
    }

    /// Poll at the configured interval until the job succeeds, fails, or the
    /// maximum wait elapses.
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<Value, ParseJobError> {
        let start = Instant::now();

        loop {
            match self.poll(job_id).await? {
                JobStatus::Succeeded(body) => {
                    info!(
                        job_id = %job_id,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Parse job completed"
                    );
                    return Ok(body);
                }
                JobStatus::Failed(message) => {
                    error!(job_id = %job_id, message = %message, "Parse job failed");
                    return Err(ParseJobError::JobFailed {
                        job_id: job_id.to_string(),
                        message,
                    });
                }
                JobStatus::Pending(status) => {
                    debug!(
                        job_id = %job_id,
                        status = %status,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Parse job not finished"
                    );
                }
            }

            let remaining = self.max_wait.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                warn!(
                    job_id = %job_id,
                    max_wait_secs = self.max_wait.as_secs(),
                    "Parse job timed out"
                );
                return Err(ParseJobError::Timeout {
                    job_id: job_id.to_string(),
                    waited_secs: start.elapsed().as_secs(),
                });
            }

            // Never sleep past the deadline.
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

/// Read a JSON body, turning non-2xx responses into
/// [`ParseJobError::Transport`].
async fn read_json(resp: Response) -> Result<Value, ParseJobError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        error!(status = %status, body = %body, "Parse API returned an error");
        return Err(ParseJobError::Transport { status, body });
    }
    serde_json::from_str(&body).map_err(|e| ParseJobError::Decode(e.to_string()))
}
