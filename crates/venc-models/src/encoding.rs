//! Video encoding options and output policy constants.

use serde::{Deserialize, Deserializer, Serialize};

use crate::storage::StorageConfig;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Encoding preset used for every rendition
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 25;
/// Default maximum video bitrate
pub const DEFAULT_BITRATE: &str = "2000k";
/// Buffer size used when the bitrate unit is not recognised
pub const FALLBACK_BUFSIZE: &str = "4000k";

/// Thumbnail preview box
pub const THUMBNAIL_WIDTH: u32 = 640;
pub const THUMBNAIL_HEIGHT: u32 = 360;
/// JPEG quality scale passed to `-q:v` (2 is near-lossless)
pub const THUMBNAIL_QUALITY: u8 = 2;

/// Dimensions assumed when the source cannot be probed
pub const FALLBACK_SOURCE_WIDTH: u32 = 1920;
pub const FALLBACK_SOURCE_HEIGHT: u32 = 1080;

/// Target resolution class of a rendition.
///
/// The queue backend sends a free-form string. `1080p` and `720p` are
/// recognised; everything else falls into the 480p class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Resolution {
    #[default]
    Hd1080,
    Hd720,
    Sd480,
}

impl Resolution {
    /// Get string representation of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Hd1080 => "1080p",
            Resolution::Hd720 => "720p",
            Resolution::Sd480 => "480p",
        }
    }

    /// Maximum width of a landscape rendition in this class.
    pub fn max_width(&self) -> u32 {
        match self {
            Resolution::Hd1080 => 1920,
            Resolution::Hd720 => 1280,
            Resolution::Sd480 => 854,
        }
    }

    /// Maximum height of a portrait rendition in this class.
    pub fn max_height(&self) -> u32 {
        match self {
            Resolution::Hd1080 => 1080,
            Resolution::Hd720 => 720,
            Resolution::Sd480 => 480,
        }
    }
}

impl From<&str> for Resolution {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "1080p" => Resolution::Hd1080,
            "720p" => Resolution::Hd720,
            _ => Resolution::Sd480,
        }
    }
}

impl From<String> for Resolution {
    fn from(value: String) -> Self {
        Resolution::from(value.as_str())
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-job encoding options (`encoding_options` in the job payload).
///
/// Unknown keys such as `format` or `generate_thumbnails` are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingOptions {
    /// Video codec passed to `-c:v`
    #[serde(default = "default_video_codec", deserialize_with = "string_or_default_codec")]
    pub codec: String,

    /// Target resolution class
    #[serde(default)]
    pub resolution: Resolution,

    /// Constant Rate Factor; accepts a number or a numeric string
    #[serde(default = "default_crf", deserialize_with = "lenient_crf")]
    pub crf: u8,

    /// Maximum bitrate, e.g. `2000k`
    #[serde(default = "default_bitrate", deserialize_with = "string_or_default_bitrate")]
    pub bitrate: String,

    /// Number of thumbnails to produce, overriding the worker default
    #[serde(default)]
    pub thumbnail_count: Option<u32>,

    /// Destination prefixes
    #[serde(default, deserialize_with = "null_as_default")]
    pub storage_config: StorageConfig,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_bitrate() -> String {
    DEFAULT_BITRATE.to_string()
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            resolution: Resolution::default(),
            crf: DEFAULT_CRF,
            bitrate: default_bitrate(),
            thumbnail_count: None,
            storage_config: StorageConfig::default(),
        }
    }
}

impl EncodingOptions {
    /// Buffer size paired with `-maxrate`: twice the bitrate in the same unit.
    pub fn bufsize(&self) -> String {
        bufsize_for(&self.bitrate)
    }
}

/// Derive `-bufsize` from a bitrate string such as `2000k` or `4M`.
pub fn bufsize_for(bitrate: &str) -> String {
    let bitrate = bitrate.trim();
    for unit in ['k', 'M'] {
        if let Some(number) = bitrate.strip_suffix(unit) {
            if let Ok(value) = number.parse::<u64>() {
                return format!("{}{}", value * 2, unit);
            }
        }
    }
    FALLBACK_BUFSIZE.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_default_codec<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty(Option::<String>::deserialize(deserializer)?).unwrap_or_else(default_video_codec))
}

fn string_or_default_bitrate<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty(Option::<String>::deserialize(deserializer)?).unwrap_or_else(default_bitrate))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn lenient_crf<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    let crf = match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(n)) => u8::try_from(n).ok(),
        Some(Raw::Float(f)) if f >= 0.0 && f <= u8::MAX as f64 => Some(f as u8),
        Some(Raw::Text(s)) => s.trim().parse::<u8>().ok(),
        _ => None,
    };
    Ok(crf.unwrap_or(DEFAULT_CRF))
}
