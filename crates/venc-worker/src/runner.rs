//! One job, from download to completion report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;
use venc_media::fs_utils::remove_file_quiet;
use venc_media::{MediaBackend, ThumbnailRequest};
use venc_models::{EncodingJob, VideoMetadata};
use venc_queue::{retry_async, QueueApi, RetryPolicy};
use venc_storage::{ObjectStore, StorageError};

use crate::classify::{classify, FailureKind};
use crate::config::WorkerConfig;
use crate::download::Fetcher;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::workspace::JobWorkspace;

/// How a failed job was reported to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The error itself rules out another attempt.
    NonRetryable,
    /// The queue may schedule another attempt.
    Retryable,
    /// Retry budget exhausted or the kind is never worth retrying.
    Final,
}

impl FailureDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureDisposition::NonRetryable => "non_retryable",
            FailureDisposition::Retryable => "retryable",
            FailureDisposition::Final => "final",
        }
    }

    /// Message sent to the queue.
    pub fn message(&self, error: &WorkerError) -> String {
        match self {
            FailureDisposition::NonRetryable => format!("Non-retryable error: {}", error),
            FailureDisposition::Retryable => format!("Retryable error: {}", error),
            FailureDisposition::Final => format!("Final failure: {}", error),
        }
    }
}

/// Decide how to report `error` for `job`.
pub fn decide_disposition(
    job: &EncodingJob,
    error: &WorkerError,
    kind: FailureKind,
    default_max_retries: u32,
) -> FailureDisposition {
    if !error.is_retryable() {
        FailureDisposition::NonRetryable
    } else if job.has_retry_budget(default_max_retries) && !kind.is_never_retry() {
        FailureDisposition::Retryable
    } else {
        FailureDisposition::Final
    }
}

/// Result of one job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        output_key: String,
        thumbnail_keys: Vec<String>,
    },
    Failed {
        kind: FailureKind,
        disposition: FailureDisposition,
        message: String,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// Settings the runner takes from the worker configuration.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub temp_dir: PathBuf,
    pub min_thumbnails: usize,
    pub thumbnail_count: u32,
    pub default_max_retries: u32,
    pub upload_retry: RetryPolicy,
}

impl RunnerSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            min_thumbnails: config.min_thumbnails,
            thumbnail_count: config.thumbnail_count,
            default_max_retries: config.max_retries,
            upload_retry: RetryPolicy::new().with_jitter(Duration::ZERO),
        }
    }
}

/// Runs jobs one at a time against the queue, media, fetch and storage seams.
pub struct JobRunner {
    queue: Arc<dyn QueueApi>,
    media: Arc<dyn MediaBackend>,
    fetcher: Arc<dyn Fetcher>,
    store: Option<Arc<dyn ObjectStore>>,
    settings: RunnerSettings,
}

impl JobRunner {
    pub fn new(
        queue: Arc<dyn QueueApi>,
        media: Arc<dyn MediaBackend>,
        fetcher: Arc<dyn Fetcher>,
        store: Option<Arc<dyn ObjectStore>>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            queue,
            media,
            fetcher,
            store,
            settings,
        }
    }

    /// Process `job` and report the outcome to the queue.
    ///
    /// Never fails: every error is classified and reported, and the job's
    /// temp files are removed on every path.
    pub async fn run(&self, job: &EncodingJob) -> JobOutcome {
        let logger = JobLogger::new(&job.video_code, "encode");
        let span = logger.create_span();

        async {
            let started = Instant::now();
            logger.log_start(&format!("attempt {}", job.retry_count + 1));

            let mut workspace = JobWorkspace::new(&self.settings.temp_dir, &job.video_code);
            let result = self.process(job, &mut workspace, &logger).await;

            let outcome = match result {
                Ok((output_key, thumbnail_keys)) => {
                    logger.log_completion(&format!(
                        "{} with {} thumbnails",
                        output_key,
                        thumbnail_keys.len()
                    ));
                    metrics::record_job_completed(started.elapsed());
                    JobOutcome::Completed {
                        output_key,
                        thumbnail_keys,
                    }
                }
                Err(e) => self.report_failure(job, &e, &logger, started).await,
            };

            workspace.cleanup().await;
            outcome
        }
        .instrument(span)
        .await
    }

    async fn report_failure(
        &self,
        job: &EncodingJob,
        error: &WorkerError,
        logger: &JobLogger,
        started: Instant,
    ) -> JobOutcome {
        let kind = classify(error);
        let disposition = decide_disposition(job, error, kind, self.settings.default_max_retries);
        let message = disposition.message(error);

        logger.log_error(&format!("{} ({}, {})", error, kind, disposition.as_str()));
        if let Err(e) = self.queue.mark_failed(&job.video_code, &message).await {
            logger.log_error(&format!("Could not report failure: {}", e));
        }
        metrics::record_job_failed(kind.as_str(), disposition.as_str(), started.elapsed());

        JobOutcome::Failed {
            kind,
            disposition,
            message,
        }
    }

    async fn process(
        &self,
        job: &EncodingJob,
        workspace: &mut JobWorkspace,
        logger: &JobLogger,
    ) -> WorkerResult<(String, Vec<String>)> {
        let code = &job.video_code;
        let options = &job.encoding_options;

        if let Err(e) = self.queue.mark_processing(code).await {
            logger.log_warning(&format!("Could not mark as processing: {}", e));
        }

        let input_url = job
            .input_url()
            .ok_or_else(|| WorkerError::non_retryable("Job missing input_file_url."))?;
        logger.log_step("download", input_url);
        self.fetcher.fetch(input_url, workspace.input_path()).await?;

        let thumbnails = self.thumbnails(job, workspace, logger).await;
        workspace.track(thumbnails.iter().cloned());
        if thumbnails.len() < self.settings.min_thumbnails {
            return Err(WorkerError::ThumbnailsIncomplete {
                required: self.settings.min_thumbnails,
                generated: thumbnails.len(),
            });
        }

        logger.log_step("encode", &format!("{} {}", options.codec, options.resolution.as_str()));
        let encode_started = Instant::now();
        self.media
            .encode(workspace.input_path(), workspace.output_path(), options)
            .await?;
        metrics::record_encode(encode_started.elapsed());

        let probe = self.media.probe(workspace.output_path()).await;
        let metadata = VideoMetadata::from_probe(probe.duration, probe.width, probe.height);
        if let Err(e) = self.queue.update_metadata(code, &metadata).await {
            logger.log_warning(&format!("Failed to update metadata: {}", e));
        }

        let storage = &options.storage_config;
        let output_key = storage.video_key(code.as_str());
        let mut thumbnail_keys = Vec::new();

        match &self.store {
            Some(store) => {
                let origin_key = storage.origin_key(code.as_str());
                if let Err(e) = self.upload(store.as_ref(), workspace.input_path(), &origin_key).await {
                    logger.log_warning(&format!("Failed to archive original: {}", e));
                }

                self.upload(store.as_ref(), workspace.output_path(), &output_key)
                    .await
                    .map_err(|e| {
                        WorkerError::upload_failed(format!("Failed to upload encoded video: {}", e))
                    })?;

                for (idx, thumb) in thumbnails.iter().enumerate() {
                    let key = storage.thumbnail_key(code.as_str(), idx + 1);
                    match self.upload(store.as_ref(), thumb, &key).await {
                        Ok(()) => thumbnail_keys.push(key),
                        Err(e) => logger.log_warning(&format!(
                            "Failed to upload thumbnail {}: {}",
                            thumb.display(),
                            e
                        )),
                    }
                }
            }
            None => logger.log_warning("Storage not configured; skipping uploads."),
        }

        self.queue
            .mark_completed(code, &output_key, &thumbnail_keys)
            .await?;

        if let Err(e) = self.queue.activate_video(code).await {
            logger.log_warning(&format!("Activation failed: {}", e));
        }

        Ok((output_key, thumbnail_keys))
    }

    /// Compose thumbnails, fetching the seed image first when the job has one.
    async fn thumbnails(
        &self,
        job: &EncodingJob,
        workspace: &JobWorkspace,
        logger: &JobLogger,
    ) -> Vec<PathBuf> {
        let seed = match job.seed_thumbnail_url() {
            Some(url) => match self.fetcher.fetch(url, workspace.seed_path()).await {
                Ok(_) => Some(workspace.seed_path()),
                Err(e) => {
                    logger.log_warning(&format!("Seed thumbnail download failed: {}", e));
                    None
                }
            },
            None => None,
        };

        let count = job
            .encoding_options
            .thumbnail_count
            .unwrap_or(self.settings.thumbnail_count);
        let request = ThumbnailRequest {
            source: workspace.input_path(),
            video_code: job.video_code.as_str(),
            seed_image: seed,
            count: count as usize,
            output_dir: workspace.dir(),
        };
        logger.log_step("thumbnails", &format!("{} requested", count));
        let produced = self.media.compose_thumbnails(&request).await;

        if seed.is_some() {
            remove_file_quiet(workspace.seed_path()).await;
        }
        produced
    }

    async fn upload(&self, store: &dyn ObjectStore, path: &Path, key: &str) -> WorkerResult<()> {
        retry_async(&self.settings.upload_retry, "upload", |_: &StorageError| true, || {
            store.upload(path, key)
        })
        .await
        .map_err(WorkerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition() {
        let mut job = EncodingJob::new("abc", Some("https://x/abc.mp4".into()));
        let timeout = WorkerError::from(venc_media::MediaError::Timeout(60));

        assert_eq!(
            decide_disposition(&job, &timeout, FailureKind::FfmpegTimeout, 3),
            FailureDisposition::Retryable
        );

        let corrupt = WorkerError::retryable("moov atom corrupt");
        assert_eq!(
            decide_disposition(&job, &corrupt, FailureKind::InvalidVideoFormat, 3),
            FailureDisposition::Final
        );

        let missing = WorkerError::non_retryable("Job missing input_file_url.");
        assert_eq!(
            decide_disposition(&job, &missing, FailureKind::UnknownError, 3),
            FailureDisposition::NonRetryable
        );

        job.retry_count = 3;
        assert_eq!(
            decide_disposition(&job, &timeout, FailureKind::FfmpegTimeout, 3),
            FailureDisposition::Final
        );
        job.max_retries = Some(5);
        assert_eq!(
            decide_disposition(&job, &timeout, FailureKind::FfmpegTimeout, 3),
            FailureDisposition::Retryable
        );
    }

    #[test]
    fn test_failure_messages() {
        let err = WorkerError::retryable("Downloaded file is empty.");
        assert_eq!(
            FailureDisposition::Retryable.message(&err),
            "Retryable error: Downloaded file is empty."
        );
        assert_eq!(
            FailureDisposition::Final.message(&err),
            "Final failure: Downloaded file is empty."
        );
        assert_eq!(
            FailureDisposition::NonRetryable.message(&WorkerError::non_retryable("HTTP 404 for u")),
            "Non-retryable error: HTTP 404 for u"
        );
    }
}
