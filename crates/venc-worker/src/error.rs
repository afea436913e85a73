//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Retrying the job cannot help (missing input, auth or not found on download).
    #[error("{0}")]
    NonRetryable(String),

    #[error("{0}")]
    Retryable(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Insufficient disk space: {available_gb:.2} GB free, {required_gb:.2} GB required")]
    InsufficientDisk { available_gb: f64, required_gb: f64 },

    #[error("Thumbnail generation failed or incomplete: required {required}, generated {generated}.")]
    ThumbnailsIncomplete { required: usize, generated: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Media(#[from] venc_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] venc_storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] venc_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn non_retryable(msg: impl Into<String>) -> Self {
        Self::NonRetryable(msg.into())
    }

    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if another attempt at the job could succeed.
    ///
    /// False for [`WorkerError::NonRetryable`], configuration errors and
    /// media errors that reject the input itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::NonRetryable(_) | WorkerError::Config(_) => false,
            WorkerError::Media(e) => e.is_retryable(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venc_media::MediaError;

    #[test]
    fn test_retryability() {
        assert!(!WorkerError::non_retryable("Job missing input_file_url.").is_retryable());
        assert!(WorkerError::retryable("Downloaded file is empty.").is_retryable());
        assert!(WorkerError::ThumbnailsIncomplete { required: 1, generated: 0 }.is_retryable());
        assert!(WorkerError::upload_failed("x").is_retryable());
        assert!(!WorkerError::from(MediaError::invalid_video("bad")).is_retryable());
        assert!(WorkerError::from(MediaError::Timeout(60)).is_retryable());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            WorkerError::ThumbnailsIncomplete { required: 2, generated: 1 }.to_string(),
            "Thumbnail generation failed or incomplete: required 2, generated 1."
        );
        assert_eq!(
            WorkerError::non_retryable("HTTP 404 for https://x/y.mp4").to_string(),
            "HTTP 404 for https://x/y.mp4"
        );
        assert_eq!(
            WorkerError::from(MediaError::Timeout(7200)).to_string(),
            "Operation timed out after 7200 seconds"
        );
    }
}
