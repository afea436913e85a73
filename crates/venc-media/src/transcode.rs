//! Rendition encoding.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;
use venc_models::encoding::{
    DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC, DEFAULT_PRESET, FALLBACK_SOURCE_HEIGHT,
    FALLBACK_SOURCE_WIDTH,
};
use venc_models::{EncodingOptions, Resolution};

/// Hard limit for a single encode.
pub const ENCODE_TIMEOUT_SECS: u64 = 7200;

/// A successfully written rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeResult {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Output dimensions for a source of `width`x`height` in a resolution class.
///
/// Portrait sources are capped by height, everything else by width. The other
/// edge keeps the aspect ratio. Sources already inside the cap keep their size.
/// Both edges are rounded down to even numbers and never exceed the source.
pub fn target_dimensions(width: u32, height: u32, resolution: Resolution) -> (u32, u32) {
    let (w, h) = (u64::from(width.max(1)), u64::from(height.max(1)));

    let (new_w, new_h) = if h > w {
        let cap = u64::from(resolution.max_height());
        if h > cap {
            (w * cap / h, cap)
        } else {
            (w, h)
        }
    } else {
        let cap = u64::from(resolution.max_width());
        if w > cap {
            (cap, h * cap / w)
        } else {
            (w, h)
        }
    };

    (even_floor(new_w, w), even_floor(new_h, h))
}

/// Largest even value not above `value`, at least 2 unless `source` is smaller.
fn even_floor(value: u64, source: u64) -> u32 {
    let even = (value - value % 2).max(2).min(source);
    u32::try_from(even).unwrap_or(u32::MAX - 1)
}

/// Smallest edge FFmpeg can scale a yuv420p stream to.
pub const MIN_SOURCE_EDGE: u32 = 2;

/// Re-tag an FFmpeg failure by what its stderr says.
///
/// Disk exhaustion stays retryable, corrupt or unsupported input becomes
/// permanent, and anything else is passed through unchanged.
pub fn classify_ffmpeg_failure(error: MediaError) -> MediaError {
    let detail = match &error {
        MediaError::FfmpegFailed { message, .. } => error
            .stderr()
            .map(str::to_string)
            .unwrap_or_else(|| message.clone()),
        _ => return error,
    };
    let text = detail.to_lowercase();

    if text.contains("no space left") || text.contains("disk full") {
        MediaError::DiskFull(detail)
    } else if text.contains("invalid data") || text.contains("corrupt") {
        MediaError::InvalidVideo(detail)
    } else if text.contains("unsupported") {
        MediaError::UnsupportedFormat(detail)
    } else {
        error
    }
}

/// Build the encode command for the given target size.
pub fn build_encode_command(
    input: &Path,
    output: &Path,
    options: &EncodingOptions,
    (width, height): (u32, u32),
) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_codec(options.codec.clone())
        .preset(DEFAULT_PRESET)
        .crf(options.crf)
        .video_filter(format!("scale={}:{}", width, height))
        .audio_codec(DEFAULT_AUDIO_CODEC)
        .audio_bitrate(DEFAULT_AUDIO_BITRATE)
        .max_rate(options.bitrate.clone(), options.bufsize())
        .faststart()
}

/// Encodes streaming-ready renditions.
#[derive(Debug, Clone)]
pub struct Transcoder {
    timeout_secs: u64,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self {
            timeout_secs: ENCODE_TIMEOUT_SECS,
        }
    }
}

impl Transcoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `input` into `output` according to `options`.
    ///
    /// Invalid input is rejected before FFmpeg runs. A missing or empty
    /// output after a clean exit is reported as [`MediaError::OutputMissing`].
    pub async fn encode(
        &self,
        input: &Path,
        output: &Path,
        options: &EncodingOptions,
    ) -> MediaResult<EncodeResult> {
        let probe = probe_media(input).await;
        if !probe.is_valid {
            return Err(MediaError::invalid_video("Invalid or corrupt video file."));
        }

        let (src_w, src_h) = probe.dimensions().unwrap_or_else(|| {
            warn!(
                "Could not detect dimensions; defaulting to {}x{}",
                FALLBACK_SOURCE_WIDTH, FALLBACK_SOURCE_HEIGHT
            );
            (FALLBACK_SOURCE_WIDTH, FALLBACK_SOURCE_HEIGHT)
        });
        if src_w < MIN_SOURCE_EDGE || src_h < MIN_SOURCE_EDGE {
            return Err(MediaError::invalid_video(format!(
                "Source {}x{} is too small to encode.",
                src_w, src_h
            )));
        }
        let (width, height) = target_dimensions(src_w, src_h, options.resolution);

        let cmd = build_encode_command(input, output, options, (width, height));
        info!(
            source = %format!("{}x{}", src_w, src_h),
            target = %format!("{}x{}", width, height),
            codec = %options.codec,
            crf = options.crf,
            bitrate = %options.bitrate,
            "Encoding rendition"
        );

        let total_ms = probe.duration.map(|d| (d * 1000.0) as i64).unwrap_or(0);
        let last_decile = AtomicI64::new(-1);
        let progress_logger = move |progress: crate::progress::FfmpegProgress| {
            let decile = (progress.percentage(total_ms) / 10.0).floor() as i64;
            if total_ms > 0 && decile > last_decile.swap(decile, Ordering::Relaxed) {
                info!(
                    percent = decile * 10,
                    speed = progress.speed,
                    eta_secs = progress.eta_seconds(total_ms).map(|s| s.round() as i64),
                    "Encode progress"
                );
            }
        };

        FfmpegRunner::new()
            .with_timeout(self.timeout_secs)
            .run_with_progress(&cmd, progress_logger)
            .await
            .map_err(classify_ffmpeg_failure)?;

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(EncodeResult {
                output: output.to_path_buf(),
                width,
                height,
            }),
            _ => Err(MediaError::OutputMissing(output.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_720p() {
        assert_eq!(target_dimensions(1920, 1080, Resolution::Hd720), (1280, 720));
    }

    #[test]
    fn test_portrait_720p_caps_height() {
        assert_eq!(target_dimensions(1080, 1920, Resolution::Hd720), (404, 720));
    }

    #[test]
    fn test_no_upscaling() {
        assert_eq!(target_dimensions(640, 360, Resolution::Hd1080), (640, 360));
        assert_eq!(target_dimensions(360, 640, Resolution::Hd720), (360, 640));
    }

    #[test]
    fn test_odd_sources_round_down_to_even() {
        assert_eq!(target_dimensions(853, 479, Resolution::Hd1080), (852, 478));
        let (w, h) = target_dimensions(1921, 1081, Resolution::Hd1080);
        assert_eq!(w % 2, 0);
        assert_eq!(h % 2, 0);
        assert!(w <= 1921 && h <= 1081);
    }

    #[test]
    fn test_dimensions_even_and_never_larger() {
        let sources = [
            (3840, 2160),
            (2160, 3840),
            (1000, 1000),
            (1279, 721),
            (721, 1279),
            (480, 270),
            (4096, 1716),
            (608, 1080),
        ];
        for &(w, h) in &sources {
            for res in [Resolution::Hd1080, Resolution::Hd720, Resolution::Sd480] {
                let (tw, th) = target_dimensions(w, h, res);
                assert_eq!(tw % 2, 0, "{}x{} {:?}", w, h, res);
                assert_eq!(th % 2, 0, "{}x{} {:?}", w, h, res);
                assert!(tw <= w && th <= h, "{}x{} {:?} -> {}x{}", w, h, res, tw, th);
            }
        }
    }

    #[test]
    fn test_degenerate_source_never_grows() {
        assert_eq!(target_dimensions(1, 4000, Resolution::Sd480), (1, 480));
        assert_eq!(target_dimensions(4000, 1, Resolution::Hd720), (1280, 1));
        assert_eq!(target_dimensions(3, 3, Resolution::Hd1080), (2, 2));
        for res in [Resolution::Hd1080, Resolution::Hd720, Resolution::Sd480] {
            let (w, h) = target_dimensions(1, 1, res);
            assert!(w <= 1 && h <= 1);
        }
    }

    #[test]
    fn test_classify_prefers_stderr_over_message() {
        let err = classify_ffmpeg_failure(MediaError::ffmpeg_failed(
            "Conversion failed",
            Some("No space left on device".into()),
            Some(1),
        ));
        assert!(matches!(err, MediaError::DiskFull(ref d) if d == "No space left on device"));

        let no_stderr = classify_ffmpeg_failure(MediaError::ffmpeg_failed(
            "Invalid data found when processing input",
            None,
            Some(1),
        ));
        assert!(matches!(no_stderr, MediaError::InvalidVideo(_)));
    }

    #[test]
    fn test_square_uses_width_cap() {
        assert_eq!(target_dimensions(1000, 1000, Resolution::Sd480), (854, 854));
    }

    #[test]
    fn test_classify_stderr() {
        let disk = classify_ffmpeg_failure(MediaError::ffmpeg_failed(
            "exit 1",
            Some("av_interleaved_write_frame(): No space left on device".into()),
            Some(1),
        ));
        assert!(matches!(disk, MediaError::DiskFull(_)));
        assert!(disk.is_retryable());

        let corrupt = classify_ffmpeg_failure(MediaError::ffmpeg_failed(
            "exit 1",
            Some("in.mp4: Invalid data found when processing input".into()),
            Some(1),
        ));
        assert!(matches!(corrupt, MediaError::InvalidVideo(_)));
        assert!(!corrupt.is_retryable());

        let unsupported = classify_ffmpeg_failure(MediaError::ffmpeg_failed(
            "exit 1",
            Some("Unsupported codec id".into()),
            Some(1),
        ));
        assert!(!unsupported.is_retryable());

        let other = classify_ffmpeg_failure(MediaError::ffmpeg_failed(
            "exit 1",
            Some("Conversion failed!".into()),
            Some(1),
        ));
        assert!(matches!(other, MediaError::FfmpegFailed { .. }));
        assert!(other.is_retryable());

        assert!(matches!(
            classify_ffmpeg_failure(MediaError::Timeout(7200)),
            MediaError::Timeout(7200)
        ));
    }

    #[test]
    fn test_encode_command_args() {
        let options = EncodingOptions {
            crf: 23,
            bitrate: "1500k".to_string(),
            ..Default::default()
        };
        let args = build_encode_command(Path::new("in.mp4"), Path::new("out.mp4"), &options, (1280, 720))
            .build_args();
        let pairs = [
            ("-c:v", "libx264"),
            ("-preset", "medium"),
            ("-crf", "23"),
            ("-vf", "scale=1280:720"),
            ("-c:a", "aac"),
            ("-b:a", "128k"),
            ("-maxrate", "1500k"),
            ("-bufsize", "3000k"),
            ("-movflags", "+faststart"),
        ];
        for (flag, value) in pairs {
            assert!(
                args.windows(2).any(|w| w[0] == flag && w[1] == value),
                "missing {} {}",
                flag,
                value
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_encoding() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("missing.mp4");
        let err = Transcoder::new()
            .encode(&input, &dir.path().join("out.mp4"), &EncodingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }
}
