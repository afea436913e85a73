//! Queue backend REST client.

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{QueueError, QueueResult};
use crate::retry::{retry_async, RetryPolicy};
use venc_models::{
    EncodingJob, JobStatusReport, QueueStats, ResetStuckResponse, VideoCode, VideoMetadata,
};

/// Queue operations the job pipeline depends on.
#[async_trait]
pub trait QueueApi: Send + Sync {
    /// Next pending job, or `None` when the queue is empty.
    async fn next_pending(&self) -> QueueResult<Option<EncodingJob>>;

    async fn mark_processing(&self, code: &VideoCode) -> QueueResult<()>;

    /// Report success. `thumbnail_paths` is left out of the body when empty.
    async fn mark_completed(
        &self,
        code: &VideoCode,
        output_file_path: &str,
        thumbnail_paths: &[String],
    ) -> QueueResult<()>;

    async fn mark_failed(&self, code: &VideoCode, error_message: &str) -> QueueResult<()>;

    async fn activate_video(&self, code: &VideoCode) -> QueueResult<()>;

    async fn update_metadata(&self, code: &VideoCode, metadata: &VideoMetadata) -> QueueResult<()>;
}

#[derive(Serialize)]
struct CompletedBody<'a> {
    output_file_path: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    thumbnail_paths: &'a [String],
}

#[derive(Serialize)]
struct FailedBody<'a> {
    error_message: &'a str,
}

/// HTTP client for the encoding queue backend.
///
/// Every call is wrapped in the configured [`RetryPolicy`]; only transient
/// errors are repeated.
#[derive(Debug, Clone)]
pub struct QueueClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl QueueClient {
    /// Create a client on top of a configured HTTP client.
    ///
    /// `base_url` includes any path prefix; endpoint paths are appended.
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn job_path(code: &VideoCode, action: &str) -> String {
        format!("encoding-queue/{}/{}", urlencoding::encode(code.as_str()), action)
    }

    /// Send one request under the retry policy.
    ///
    /// A 404 is handed back to the caller when `allow_not_found` is set;
    /// every other non-2xx status becomes [`QueueError::Status`].
    async fn send(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<Value>,
        allow_not_found: bool,
    ) -> QueueResult<Response> {
        let url = self.endpoint(path);

        retry_async(&self.retry, operation, QueueError::is_transient, || async {
            debug!(operation = %operation, url = %url, "Queue request");

            let mut request = self.http.request(method.clone(), &url);
            if let Some(body) = &body {
                request = request.json(body);
            }
            let response = request.send().await?;
            let status = response.status();

            if status.is_success() || (allow_not_found && status == StatusCode::NOT_FOUND) {
                return Ok(response);
            }
            let text = response.text().await.unwrap_or_default();
            Err(QueueError::status(status.as_u16(), operation, text))
        })
        .await
    }

    async fn post(&self, operation: &str, path: &str, body: Option<Value>) -> QueueResult<()> {
        self.send(operation, Method::POST, path, body, false).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, path: &str) -> QueueResult<T> {
        let response = self.send(operation, Method::GET, path, None, false).await?;
        decode(operation, response).await
    }

    fn to_body<T: Serialize>(operation: &str, value: &T) -> QueueResult<Value> {
        serde_json::to_value(value).map_err(|e| QueueError::invalid_response(operation, e.to_string()))
    }

    /// Single unretried `next-pending` request returning the raw status.
    ///
    /// Used by the health check, which judges connectivity by status code.
    pub async fn probe_next_pending(&self) -> QueueResult<u16> {
        let response = self
            .http
            .get(self.endpoint("encoding-queue/next-pending"))
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    /// Queue statistics.
    pub async fn stats(&self) -> QueueResult<QueueStats> {
        self.get_json("queue_stats", "encoding-queue/stats").await
    }

    /// Status of a single job.
    pub async fn job_status(&self, code: &VideoCode) -> QueueResult<JobStatusReport> {
        self.get_json("job_status", &Self::job_path(code, "status")).await
    }

    /// Ask the backend to release jobs stuck in processing.
    pub async fn reset_stuck(&self) -> QueueResult<ResetStuckResponse> {
        let response = self
            .send("reset_stuck", Method::POST, "encoding-queue/reset-stuck", None, false)
            .await?;
        decode("reset_stuck", response).await
    }

    /// Put a failed job back into the pending state.
    pub async fn retry_job(&self, code: &VideoCode) -> QueueResult<()> {
        self.post("retry_job", &Self::job_path(code, "retry"), None).await
    }
}

async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> QueueResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| QueueError::invalid_response(operation, e.to_string()))
}

#[async_trait]
impl QueueApi for QueueClient {
    async fn next_pending(&self) -> QueueResult<Option<EncodingJob>> {
        let response = self
            .send("next_pending", Method::GET, "encoding-queue/next-pending", None, true)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Queue is empty");
            return Ok(None);
        }

        let job: EncodingJob = decode("next_pending", response).await?;
        info!(video_code = %job.video_code, retry_count = job.retry_count, "Fetched pending job");
        Ok(Some(job))
    }

    async fn mark_processing(&self, code: &VideoCode) -> QueueResult<()> {
        self.post("mark_processing", &Self::job_path(code, "processing"), None)
            .await
    }

    async fn mark_completed(
        &self,
        code: &VideoCode,
        output_file_path: &str,
        thumbnail_paths: &[String],
    ) -> QueueResult<()> {
        let body = Self::to_body(
            "mark_completed",
            &CompletedBody {
                output_file_path,
                thumbnail_paths,
            },
        )?;
        self.post("mark_completed", &Self::job_path(code, "completed"), Some(body))
            .await
    }

    async fn mark_failed(&self, code: &VideoCode, error_message: &str) -> QueueResult<()> {
        let body = Self::to_body("mark_failed", &FailedBody { error_message })?;
        self.post("mark_failed", &Self::job_path(code, "failed"), Some(body))
            .await
    }

    async fn activate_video(&self, code: &VideoCode) -> QueueResult<()> {
        let path = format!("videos/{}/activate", urlencoding::encode(code.as_str()));
        self.post("activate_video", &path, None).await
    }

    async fn update_metadata(&self, code: &VideoCode, metadata: &VideoMetadata) -> QueueResult<()> {
        let path = format!("videos/{}/metadata", urlencoding::encode(code.as_str()));
        let body = Self::to_body("update_metadata", metadata)?;
        self.post("update_metadata", &path, Some(body)).await
    }
}
