//! FFmpeg `-progress pipe:2` parsing.

use serde::Serialize;

/// Keys FFmpeg emits in its `-progress` key=value records.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

/// Snapshot of an encode in flight.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Current encode FPS
    pub fps: f64,
    /// Output position in milliseconds
    pub out_time_ms: i64,
    /// Bytes written so far
    pub total_size: u64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Set on the final `progress=end` record
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given the total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }

    /// Estimated seconds remaining.
    pub fn eta_seconds(&self, total_duration_ms: i64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }
        let remaining_ms = (total_duration_ms - self.out_time_ms).max(0);
        Some((remaining_ms as f64 / 1000.0) / self.speed)
    }
}

/// Whether a stderr line belongs to the progress stream rather than diagnostics.
pub fn is_progress_line(line: &str) -> bool {
    line.trim()
        .split_once('=')
        .map(|(key, _)| PROGRESS_KEYS.contains(&key) || key.starts_with("stream_"))
        .unwrap_or(false)
}

/// Fold one progress line into `current`; returns a snapshot at each record boundary.
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        // Despite the name, FFmpeg reports microseconds here as well.
        "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "total_size" => {
            if let Ok(size) = value.parse() {
                current.total_size = size;
            }
        }
        "speed" => {
            if let Some(speed) = value.trim().strip_suffix('x').and_then(|s| s.parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(current.clone());
        }
        _ => {}
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_parsing() {
        let mut progress = FfmpegProgress::default();
        assert!(parse_progress_line("frame=120", &mut progress).is_none());
        parse_progress_line("out_time_us=4000000", &mut progress);
        parse_progress_line("speed=2.5x", &mut progress);
        parse_progress_line("speed=N/A", &mut progress);

        let snapshot = parse_progress_line("progress=continue", &mut progress).unwrap();
        assert_eq!(snapshot.frame, 120);
        assert_eq!(snapshot.out_time_ms, 4000);
        assert!((snapshot.speed - 2.5).abs() < 0.01);
        assert!(!snapshot.is_complete);

        let last = parse_progress_line("progress=end", &mut progress).unwrap();
        assert!(last.is_complete);
    }

    #[test]
    fn test_percentage_and_eta() {
        let progress = FfmpegProgress {
            out_time_ms: 30_000,
            speed: 2.0,
            ..Default::default()
        };
        assert!((progress.percentage(60_000) - 50.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
        assert!((progress.eta_seconds(60_000).unwrap() - 15.0).abs() < 0.01);
    }

    #[test]
    fn test_progress_line_detection() {
        assert!(is_progress_line("out_time=00:00:04.000000"));
        assert!(is_progress_line("stream_0_0_q=28.0"));
        assert!(!is_progress_line("[h264 @ 0x55] Invalid NAL unit size"));
        assert!(!is_progress_line("Error opening input file"));
    }
}
