//! Destination key layout in object storage.

use serde::{Deserialize, Serialize};

/// Destination prefixes for a job's artifacts.
///
/// Keys are sharded by a single character, normally the lower-cased first
/// character of the video code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_videos")]
    pub videos: String,
    #[serde(default = "default_thumbnails")]
    pub thumbnails: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Shard character; derived from the video code when absent
    #[serde(default)]
    pub first_char: Option<String>,
}

fn default_videos() -> String {
    "videos".to_string()
}
fn default_thumbnails() -> String {
    "thumbnails".to_string()
}
fn default_origin() -> String {
    "origin".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            videos: default_videos(),
            thumbnails: default_thumbnails(),
            origin: default_origin(),
            first_char: None,
        }
    }
}

impl StorageConfig {
    /// Shard character for a video code.
    pub fn shard_for(&self, video_code: &str) -> String {
        self.first_char
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                video_code
                    .chars()
                    .next()
                    .map(|c| c.to_lowercase().collect())
                    .unwrap_or_default()
            })
    }

    /// Key of the encoded rendition: `{videos}/{shard}/{code}.mp4`.
    pub fn video_key(&self, video_code: &str) -> String {
        format!("{}/{}/{}.mp4", self.videos, self.shard_for(video_code), video_code)
    }

    /// Key of the archived original: `{origin}/{shard}/{code}.mp4`.
    pub fn origin_key(&self, video_code: &str) -> String {
        format!("{}/{}/{}.mp4", self.origin, self.shard_for(video_code), video_code)
    }

    /// Key of thumbnail `index` (1-based): `{thumbnails}/{shard}/{code}_thumb_{n}.jpg`.
    pub fn thumbnail_key(&self, video_code: &str, index: usize) -> String {
        format!(
            "{}/{}/{}_thumb_{}.jpg",
            self.thumbnails,
            self.shard_for(video_code),
            video_code,
            index
        )
    }
}
