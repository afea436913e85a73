//! FFmpeg CLI wrapper for the encoding pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe inspection that never fails
//! - Orientation-aware thumbnail composition
//! - Rendition encoding with failure classification from FFmpeg's stderr

pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod thumbnail;
pub mod toolkit;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::{CompositionFilter, Orientation};
pub use probe::{probe_media, MediaProbe};
pub use progress::FfmpegProgress;
pub use thumbnail::{thumbnail_file_name, thumbnail_timestamps, ThumbnailComposer, ThumbnailRequest};
pub use toolkit::{FfmpegToolkit, MediaBackend};
pub use transcode::{target_dimensions, EncodeResult, Transcoder};
