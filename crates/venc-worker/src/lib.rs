//! Queue-driven video encoding worker.
//!
//! The worker polls a REST queue for pending jobs and, one at a time,
//! downloads the source, composes preview thumbnails, encodes a
//! streaming-ready MP4, uploads the results and reports back to the queue.

pub mod app;
pub mod classify;
pub mod cli;
pub mod config;
pub mod disk;
pub mod download;
pub mod error;
pub mod health;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod poll;
pub mod runner;
pub mod workspace;

pub use app::Worker;
pub use classify::{classify, FailureKind};
pub use config::{OriginAuth, WorkerConfig};
pub use download::{Downloader, Fetcher};
pub use error::{WorkerError, WorkerResult};
pub use health::{HealthReport, HealthStatus};
pub use logging::JobLogger;
pub use poll::{BackoffState, IterationEvent, PollLoop};
pub use runner::{FailureDisposition, JobOutcome, JobRunner, RunnerSettings};
