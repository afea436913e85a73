//! Worker health check.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use venc_queue::QueueClient;

use crate::config::WorkerConfig;
use crate::disk::{bytes_to_gb, check_space, DiskSpace};

const FFMPEG_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub issues: Vec<String>,
    pub checks: BTreeMap<&'static str, CheckState>,
}

impl HealthReport {
    fn new() -> Self {
        Self {
            status: HealthStatus::Healthy,
            timestamp: Utc::now(),
            issues: Vec::new(),
            checks: BTreeMap::new(),
        }
    }

    /// Lower the status; it never improves again.
    fn degrade(&mut self, status: HealthStatus) {
        self.status = self.status.max(status);
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Raw results of the individual probes.
#[derive(Debug, Clone)]
pub struct HealthProbes {
    pub disk: DiskSpace,
    /// `Err` holds why FFmpeg is unusable
    pub ffmpeg: Result<(), String>,
    /// Status of `next-pending`, or why the request failed
    pub api: Result<u16, String>,
}

/// Turn probe results into a report.
///
/// Low disk space is a warning. Missing FFmpeg or an unreachable API makes
/// the worker unhealthy; an API answering anything but 200/404 is a warning.
pub fn assess(probes: &HealthProbes) -> HealthReport {
    let mut report = HealthReport::new();

    if let DiskSpace::Low {
        available_bytes,
        required_bytes,
    } = probes.disk
    {
        report.issues.push(format!(
            "Low disk space: {:.2} GB free, {:.2} GB required",
            bytes_to_gb(available_bytes),
            bytes_to_gb(required_bytes)
        ));
        report.degrade(HealthStatus::Warning);
    }
    report.checks.insert("disk_space", CheckState::Ok);

    match &probes.ffmpeg {
        Ok(()) => {
            report.checks.insert("ffmpeg", CheckState::Ok);
        }
        Err(reason) => {
            report.checks.insert("ffmpeg", CheckState::Error);
            report.issues.push(format!("FFmpeg not available: {}", reason));
            report.degrade(HealthStatus::Unhealthy);
        }
    }

    match &probes.api {
        Ok(200) | Ok(404) => {
            report.checks.insert("api_connectivity", CheckState::Ok);
        }
        Ok(status) => {
            report.checks.insert("api_connectivity", CheckState::Warning);
            report.issues.push(format!("API answered HTTP {}", status));
            report.degrade(HealthStatus::Warning);
        }
        Err(reason) => {
            report.checks.insert("api_connectivity", CheckState::Error);
            report.issues.push(format!("API unreachable: {}", reason));
            report.degrade(HealthStatus::Unhealthy);
        }
    }

    report
}

async fn check_ffmpeg() -> Result<(), String> {
    let run = Command::new("ffmpeg")
        .arg("-version")
        .kill_on_drop(true)
        .output();
    match tokio::time::timeout(FFMPEG_CHECK_TIMEOUT, run).await {
        Ok(Ok(output)) if output.status.success() => Ok(()),
        Ok(Ok(output)) => Err(format!("ffmpeg -version exited with {}", output.status)),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "ffmpeg -version timed out after {}s",
            FFMPEG_CHECK_TIMEOUT.as_secs()
        )),
    }
}

/// Probe disk, FFmpeg and the queue API.
pub async fn run_health_check(config: &WorkerConfig, queue: &QueueClient) -> HealthReport {
    let probes = HealthProbes {
        disk: check_space(&config.temp_dir, config.min_disk_space_bytes()),
        ffmpeg: check_ffmpeg().await,
        api: queue
            .probe_next_pending()
            .await
            .map_err(|e| e.to_string()),
    };
    assess(&probes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probes() -> HealthProbes {
        HealthProbes {
            disk: DiskSpace::Sufficient {
                available_bytes: 10 << 30,
            },
            ffmpeg: Ok(()),
            api: Ok(404),
        }
    }

    #[test]
    fn test_all_good() {
        let report = assess(&probes());
        assert!(report.is_healthy());
        assert!(report.issues.is_empty());
        assert_eq!(report.checks["api_connectivity"], CheckState::Ok);
    }

    #[test]
    fn test_low_disk_is_warning() {
        let report = assess(&HealthProbes {
            disk: DiskSpace::Low {
                available_bytes: 1 << 30,
                required_bytes: 2 << 30,
            },
            ..probes()
        });
        assert_eq!(report.status, HealthStatus::Warning);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_unknown_disk_is_not_an_issue() {
        let report = assess(&HealthProbes {
            disk: DiskSpace::Unknown,
            ..probes()
        });
        assert!(report.is_healthy());
    }

    #[test]
    fn test_missing_ffmpeg_is_unhealthy() {
        let report = assess(&HealthProbes {
            ffmpeg: Err("No such file or directory".into()),
            ..probes()
        });
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.checks["ffmpeg"], CheckState::Error);
    }

    #[test]
    fn test_api_statuses() {
        let odd = assess(&HealthProbes {
            api: Ok(500),
            ..probes()
        });
        assert_eq!(odd.status, HealthStatus::Warning);

        let down = assess(&HealthProbes {
            api: Err("connection refused".into()),
            disk: DiskSpace::Low {
                available_bytes: 0,
                required_bytes: 1,
            },
            ..probes()
        });
        assert_eq!(down.status, HealthStatus::Unhealthy);
        assert_eq!(down.issues.len(), 2);
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(assess(&probes())).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["checks"]["ffmpeg"], "ok");
        assert!(json["timestamp"].is_string());
    }
}
