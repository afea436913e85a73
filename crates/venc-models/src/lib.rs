//! Shared data models for the video encoding worker.
//!
//! This crate provides Serde-serializable types for:
//! - Encoding jobs as handed out by the queue backend
//! - Encoding options and resolution classes
//! - Storage key layout for renditions, thumbnails and originals
//! - Queue status, statistics and video metadata payloads

pub mod encoding;
pub mod job;
pub mod job_status;
pub mod storage;
pub mod video;

// Re-export common types
pub use encoding::{EncodingOptions, Resolution};
pub use job::{EncodingJob, VideoCode};
pub use job_status::{
    JobStatus, JobStatusReport, QueueAssessment, QueueCondition, QueueStats, ResetStuckResponse,
};
pub use storage::StorageConfig;
pub use video::VideoMetadata;
