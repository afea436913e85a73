//! Worker metrics.
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric name constants for consistency.
pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "venc_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "venc_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "venc_job_duration_seconds";
    pub const ENCODE_DURATION_SECONDS: &str = "venc_encode_duration_seconds";
    pub const POLL_BACKOFFS_TOTAL: &str = "venc_poll_backoffs_total";
}

/// Serve Prometheus metrics on `addr`. Must run inside the tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config(format!("Failed to start metrics exporter: {}", e)))
}

pub fn record_job_completed(elapsed: Duration) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "completed").record(elapsed.as_secs_f64());
}

pub fn record_job_failed(kind: &str, disposition: &str, elapsed: Duration) {
    counter!(
        names::JOBS_FAILED_TOTAL,
        "kind" => kind.to_string(),
        "disposition" => disposition.to_string()
    )
    .increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "failed").record(elapsed.as_secs_f64());
}

pub fn record_encode(elapsed: Duration) {
    histogram!(names::ENCODE_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn record_backoff() {
    counter!(names::POLL_BACKOFFS_TOTAL).increment(1);
}
