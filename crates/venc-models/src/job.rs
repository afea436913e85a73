//! Encoding job as handed out by the queue backend.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EncodingOptions;

/// Opaque unique identifier of a video; the basis of all temp and storage names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoCode(pub String);

impl VideoCode {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A unit of work from `GET /encoding-queue/next-pending`.
///
/// `retry_count` and `max_retries` belong to the queue owner and are only
/// read here to pick the failure message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingJob {
    pub video_code: VideoCode,

    /// Source location (object storage URL or plain HTTP URL)
    #[serde(default)]
    pub input_file_url: Option<String>,

    /// Optional image used as thumbnail #1
    #[serde(default)]
    pub uploaded_thumbnail_url: Option<String>,

    #[serde(default, deserialize_with = "null_as_default_options")]
    pub encoding_options: EncodingOptions,

    #[serde(default)]
    pub retry_count: u32,

    /// Retry budget; the worker falls back to its configured value when absent
    #[serde(default)]
    pub max_retries: Option<u32>,
}

fn null_as_default_options<'de, D>(deserializer: D) -> Result<EncodingOptions, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<EncodingOptions>::deserialize(deserializer)?.unwrap_or_default())
}

impl EncodingJob {
    /// Create a job with default options.
    pub fn new(video_code: impl Into<VideoCode>, input_file_url: Option<String>) -> Self {
        Self {
            video_code: video_code.into(),
            input_file_url,
            uploaded_thumbnail_url: None,
            encoding_options: EncodingOptions::default(),
            retry_count: 0,
            max_retries: None,
        }
    }

    /// Source URL, treating an empty string as missing.
    pub fn input_url(&self) -> Option<&str> {
        self.input_file_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Seed thumbnail URL, treating an empty string as missing.
    pub fn seed_thumbnail_url(&self) -> Option<&str> {
        self.uploaded_thumbnail_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Whether a failure on this attempt still leaves retry budget.
    pub fn has_retry_budget(&self, default_max_retries: u32) -> bool {
        self.retry_count < self.max_retries.unwrap_or(default_max_retries)
    }
}
