//! Video metadata reported after encoding.

use serde::{Deserialize, Serialize};

/// Body of `POST /videos/{code}/metadata`.
///
/// Duration is whole seconds; every field is nullable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl VideoMetadata {
    /// Build from probed values, truncating the duration to whole seconds.
    pub fn from_probe(duration: Option<f64>, width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            duration: duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d.trunc() as u64),
            width,
            height,
        }
    }

    /// Whether nothing at all was detected.
    pub fn is_empty(&self) -> bool {
        self.duration.is_none() && self.width.is_none() && self.height.is_none()
    }
}
