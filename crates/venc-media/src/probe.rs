//! FFprobe media inspection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// FFprobe timeout in seconds.
pub const PROBE_TIMEOUT_SECS: u64 = 30;

/// What FFprobe could tell about a file.
///
/// Probing never fails: any tool or parse error yields an invalid probe
/// with every field unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    /// At least one stream of type video
    pub is_valid: bool,
    /// Container duration in seconds
    pub duration: Option<f64>,
    /// Width of the first video stream
    pub width: Option<u32>,
    /// Height of the first video stream
    pub height: Option<u32>,
}

impl MediaProbe {
    /// Duration and dimensions, if all three are known.
    pub fn geometry(&self) -> Option<(f64, u32, u32)> {
        Some((self.duration?, self.width?, self.height?))
    }

    /// Dimensions of the first video stream, if known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }

    /// Parse `ffprobe -print_format json -show_format -show_streams` output.
    pub fn from_ffprobe_json(stdout: &[u8]) -> MediaResult<Self> {
        let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

        let video_stream = probe.streams.iter().find(|s| s.codec_type.as_deref() == Some("video"));

        let duration = probe
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0);

        Ok(Self {
            is_valid: video_stream.is_some(),
            duration,
            width: video_stream.and_then(|s| s.width).filter(|w| *w > 0),
            height: video_stream.and_then(|s| s.height).filter(|h| *h > 0),
        })
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe a media file; see [`MediaProbe`] for the failure contract.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaProbe {
    let path = path.as_ref();
    match run_ffprobe(path).await {
        Ok(probe) => probe,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "FFprobe could not read file");
            MediaProbe::default()
        }
    }
}

async fn run_ffprobe(path: &Path) -> MediaResult<MediaProbe> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(Duration::from_secs(PROBE_TIMEOUT_SECS), output)
        .await
        .map_err(|_| MediaError::Timeout(PROBE_TIMEOUT_SECS))??;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    MediaProbe::from_ffprobe_json(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080}
            ],
            "format": {"duration": "63.480000", "size": "1000"}
        }"#;
        let probe = MediaProbe::from_ffprobe_json(json).unwrap();
        assert!(probe.is_valid);
        assert_eq!(probe.dimensions(), Some((1920, 1080)));
        let (duration, _, _) = probe.geometry().unwrap();
        assert!((duration - 63.48).abs() < 1e-6);
    }

    #[test]
    fn test_audio_only_is_invalid() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "10.0"}}"#;
        let probe = MediaProbe::from_ffprobe_json(json).unwrap();
        assert!(!probe.is_valid);
        assert_eq!(probe.width, None);
        assert!(probe.geometry().is_none());
    }

    #[test]
    fn test_missing_duration() {
        let json = br#"{"streams": [{"codec_type": "video", "width": 720, "height": 1280}]}"#;
        let probe = MediaProbe::from_ffprobe_json(json).unwrap();
        assert!(probe.is_valid);
        assert_eq!(probe.duration, None);
        assert!(probe.geometry().is_none());
    }

    #[test]
    fn test_malformed_output_is_error() {
        assert!(MediaProbe::from_ffprobe_json(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_file_probes_invalid() {
        let probe = probe_media("/definitely/not/here.mp4").await;
        assert_eq!(probe, MediaProbe::default());
    }
}
