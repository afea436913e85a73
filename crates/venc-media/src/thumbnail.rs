//! Thumbnail composition.
//!
//! A thumbnail set is an ordered list of JPEG previews. Index 1 is the cover:
//! the caller-supplied seed image when one is usable, otherwise the first
//! extracted frame. The rest are frames spread over the central 80% of the
//! timeline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{CompositionFilter, Orientation};
use crate::probe::{probe_media, MediaProbe};
use venc_models::encoding::THUMBNAIL_QUALITY;

/// Timeout for one frame extraction.
pub const FRAME_TIMEOUT_SECS: u64 = 60;
/// Timeout for recomposing the seed image.
pub const SEED_TIMEOUT_SECS: u64 = 30;

/// Local file name of thumbnail `index` (1-based).
pub fn thumbnail_file_name(video_code: &str, index: usize) -> String {
    format!("{}_thumb_{}.jpg", video_code, index)
}

/// Timestamps for `count` frames of a `duration`-second video.
///
/// One frame sits at the midpoint; more frames are evenly spaced from 10% to
/// 90% of the duration inclusive.
pub fn thumbnail_timestamps(duration: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![duration / 2.0],
        _ => {
            let last = (count - 1) as f64;
            (0..count)
                .map(|i| duration * (0.1 + 0.8 * (i as f64 / last)))
                .collect()
        }
    }
}

/// Inputs of one composition run.
#[derive(Debug, Clone)]
pub struct ThumbnailRequest<'a> {
    /// Source video
    pub source: &'a Path,
    /// Video code used for output naming
    pub video_code: &'a str,
    /// Already-downloaded seed image for thumbnail #1
    pub seed_image: Option<&'a Path>,
    /// Target number of thumbnails
    pub count: usize,
    /// Directory receiving `{code}_thumb_{n}.jpg`
    pub output_dir: &'a Path,
}

/// Renders one FFmpeg image command.
#[async_trait]
pub(crate) trait FrameRenderer: Send + Sync {
    async fn render(&self, cmd: &FfmpegCommand, timeout_secs: u64) -> MediaResult<()>;
}

struct FfmpegRenderer;

#[async_trait]
impl FrameRenderer for FfmpegRenderer {
    async fn render(&self, cmd: &FfmpegCommand, timeout_secs: u64) -> MediaResult<()> {
        FfmpegRunner::new().with_timeout(timeout_secs).run(cmd).await
    }
}

/// Produces ordered thumbnail sets with orientation-aware composition.
#[derive(Debug, Clone, Default)]
pub struct ThumbnailComposer;

impl ThumbnailComposer {
    pub fn new() -> Self {
        Self
    }

    /// Compose up to `request.count` thumbnails.
    ///
    /// Returns an empty set when the source has no usable duration or
    /// dimensions. Individual failures are logged and skipped, so the set may
    /// be shorter than requested; it never has gaps in its numbering.
    pub async fn compose(&self, request: &ThumbnailRequest<'_>) -> Vec<PathBuf> {
        let probe = probe_media(request.source).await;
        compose_with(&FfmpegRenderer, &probe, request).await
    }
}

pub(crate) async fn compose_with(
    renderer: &dyn FrameRenderer,
    probe: &MediaProbe,
    request: &ThumbnailRequest<'_>,
) -> Vec<PathBuf> {
    let mut thumbnails = Vec::with_capacity(request.count);

    let Some((duration, width, height)) = probe.geometry() else {
        warn!(
            video_code = request.video_code,
            "Missing duration or video dimensions; cannot generate thumbnails"
        );
        return thumbnails;
    };

    let orientation = Orientation::from_dimensions(width, height);
    let filter = CompositionFilter::for_orientation(orientation);

    if let Some(seed) = request.seed_image.filter(|_| request.count > 0) {
        let output = request.output_dir.join(thumbnail_file_name(request.video_code, 1));
        let cmd = filter.apply(FfmpegCommand::new(seed, &output).single_image(THUMBNAIL_QUALITY));

        match render_checked(renderer, &cmd, SEED_TIMEOUT_SECS).await {
            Ok(()) => {
                info!(video_code = request.video_code, "Uploaded thumbnail processed as #1");
                thumbnails.push(output);
            }
            Err(e) => warn!(
                video_code = request.video_code,
                error = %e,
                "Failed to process uploaded thumbnail"
            ),
        }
    }

    let remaining = request.count.saturating_sub(thumbnails.len());
    for timestamp in thumbnail_timestamps(duration, remaining) {
        let index = thumbnails.len() + 1;
        let output = request
            .output_dir
            .join(thumbnail_file_name(request.video_code, index));
        let cmd = filter.apply(
            FfmpegCommand::new(request.source, &output)
                .seek(timestamp)
                .single_image(THUMBNAIL_QUALITY),
        );

        match render_checked(renderer, &cmd, FRAME_TIMEOUT_SECS).await {
            Ok(()) => {
                info!(
                    video_code = request.video_code,
                    index,
                    at_secs = %format!("{:.1}", timestamp),
                    mode = orientation.as_str(),
                    "Generated thumbnail"
                );
                thumbnails.push(output);
            }
            Err(e) => warn!(
                video_code = request.video_code,
                index,
                error = %e,
                "Failed to generate thumbnail"
            ),
        }
    }

    thumbnails
}

/// Render and require a non-empty output file.
async fn render_checked(
    renderer: &dyn FrameRenderer,
    cmd: &FfmpegCommand,
    timeout_secs: u64,
) -> MediaResult<()> {
    renderer.render(cmd, timeout_secs).await?;
    match tokio::fs::metadata(cmd.output()).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(MediaError::OutputMissing(cmd.output().to_path_buf())),
    }
}
