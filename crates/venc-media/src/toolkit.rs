//! The media operations a job needs, behind one trait.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::MediaResult;
use crate::probe::{probe_media, MediaProbe};
use crate::thumbnail::{ThumbnailComposer, ThumbnailRequest};
use crate::transcode::{EncodeResult, Transcoder};
use venc_models::EncodingOptions;

/// Probe, thumbnail and encode operations used by the job pipeline.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Inspect a media file. Never fails.
    async fn probe(&self, path: &Path) -> MediaProbe;

    /// Produce an ordered thumbnail set; possibly shorter than requested.
    async fn compose_thumbnails(&self, request: &ThumbnailRequest<'_>) -> Vec<PathBuf>;

    /// Encode a rendition.
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        options: &EncodingOptions,
    ) -> MediaResult<EncodeResult>;
}

/// [`MediaBackend`] backed by the FFmpeg and FFprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    composer: ThumbnailComposer,
    transcoder: Transcoder,
}

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaBackend for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> MediaProbe {
        probe_media(path).await
    }

    async fn compose_thumbnails(&self, request: &ThumbnailRequest<'_>) -> Vec<PathBuf> {
        self.composer.compose(request).await
    }

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        options: &EncodingOptions,
    ) -> MediaResult<EncodeResult> {
        self.transcoder.encode(input, output, options).await
    }
}
