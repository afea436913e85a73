//! Failure classification for operator diagnostics.
//!
//! Structured error kinds are checked first, the message text second; the
//! first tag that matches wins.

use venc_media::MediaError;

use crate::error::WorkerError;

/// Diagnostic tag attached to a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    NetworkError,
    TemporaryDiskFull,
    FfmpegTimeout,
    MemoryError,
    InvalidVideoFormat,
    UnsupportedCodec,
    DownloadFailed,
    UploadFailed,
    UnknownError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NetworkError => "network_error",
            FailureKind::TemporaryDiskFull => "temporary_disk_full",
            FailureKind::FfmpegTimeout => "ffmpeg_timeout",
            FailureKind::MemoryError => "memory_error",
            FailureKind::InvalidVideoFormat => "invalid_video_format",
            FailureKind::UnsupportedCodec => "unsupported_codec",
            FailureKind::DownloadFailed => "download_failed",
            FailureKind::UploadFailed => "upload_failed",
            FailureKind::UnknownError => "unknown_error",
        }
    }

    /// Kinds for which another attempt is never useful.
    pub fn is_never_retry(&self) -> bool {
        matches!(
            self,
            FailureKind::InvalidVideoFormat | FailureKind::UnsupportedCodec
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_connectivity(error: &WorkerError) -> bool {
    match error {
        WorkerError::Network(e) => e.is_connect() || e.is_timeout(),
        WorkerError::Queue(e) => e.is_connectivity(),
        _ => false,
    }
}

/// Tag an error.
pub fn classify(error: &WorkerError) -> FailureKind {
    let text = error.to_string().to_lowercase();

    if is_connectivity(error) {
        return FailureKind::NetworkError;
    }
    if matches!(
        error,
        WorkerError::Media(MediaError::DiskFull(_)) | WorkerError::InsufficientDisk { .. }
    ) || text.contains("no space left")
        || text.contains("disk full")
    {
        return FailureKind::TemporaryDiskFull;
    }
    if matches!(error, WorkerError::Media(MediaError::Timeout(_))) || text.contains("timeout") {
        return FailureKind::FfmpegTimeout;
    }
    if text.contains("memory") {
        return FailureKind::MemoryError;
    }
    if matches!(error, WorkerError::Media(MediaError::InvalidVideo(_)))
        || text.contains("invalid")
        || text.contains("corrupt")
    {
        return FailureKind::InvalidVideoFormat;
    }
    if matches!(error, WorkerError::Media(MediaError::UnsupportedFormat(_)))
        || text.contains("unsupported")
    {
        return FailureKind::UnsupportedCodec;
    }
    if matches!(error, WorkerError::DownloadFailed(_)) || text.contains("download") {
        return FailureKind::DownloadFailed;
    }
    if matches!(error, WorkerError::UploadFailed(_)) || text.contains("upload") {
        return FailureKind::UploadFailed;
    }
    FailureKind::UnknownError
}
