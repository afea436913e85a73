//! Tracing setup and structured job logging.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;
use venc_models::VideoCode;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. JSON lines are written
/// when `json` is true, colored text otherwise.
pub fn init_tracing(default_level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},venc={level},aws_config=warn,aws_smithy_runtime=warn,hyper=warn",
            level = default_level
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing already initialized: {}", e);
    }
}

/// Whether `LOG_FORMAT=json` is set.
pub fn json_from_env() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Job logger for structured logging with consistent formatting.
///
/// Every line carries the video code, the operation and a per-run id that
/// tells retries of the same job apart.
#[derive(Debug, Clone)]
pub struct JobLogger {
    video_code: String,
    operation: String,
    run_id: String,
}

impl JobLogger {
    pub fn new(video_code: &VideoCode, operation: &str) -> Self {
        Self {
            video_code: video_code.to_string(),
            operation: operation.to_string(),
            run_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            video_code = %self.video_code,
            operation = %self.operation,
            run_id = %self.run_id,
            "Job started: {}", message
        );
    }

    pub fn log_step(&self, step: &str, message: &str) {
        info!(
            video_code = %self.video_code,
            step,
            run_id = %self.run_id,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            video_code = %self.video_code,
            operation = %self.operation,
            run_id = %self.run_id,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            video_code = %self.video_code,
            operation = %self.operation,
            run_id = %self.run_id,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            video_code = %self.video_code,
            operation = %self.operation,
            run_id = %self.run_id,
            "Job completed: {}", message
        );
    }

    pub fn video_code(&self) -> &str {
        &self.video_code
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Span wrapping the whole job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            video_code = %self.video_code,
            operation = %self.operation,
            run_id = %self.run_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let logger = JobLogger::new(&VideoCode::from("abc"), "encode");
        assert_eq!(logger.video_code(), "abc");
        assert_eq!(logger.run_id().len(), 8);
    }

    #[test]
    fn test_run_ids_differ() {
        let code = VideoCode::from("abc");
        assert_ne!(
            JobLogger::new(&code, "encode").run_id(),
            JobLogger::new(&code, "encode").run_id()
        );
    }
}
