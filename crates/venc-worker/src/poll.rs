//! The polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};
use venc_queue::QueueApi;

use crate::config::WorkerConfig;
use crate::metrics;
use crate::runner::JobRunner;

/// Ceiling for the sleep after a loop-level error.
pub const LOOP_ERROR_DELAY_CAP: Duration = Duration::from_secs(60);
/// Largest exponent of the back-off.
const MAX_BACKOFF_EXPONENT: u32 = 5;

/// Consecutive-error bookkeeping for the loop.
#[derive(Debug, Clone)]
pub struct BackoffState {
    consecutive_errors: u32,
    threshold: u32,
    poll_interval: Duration,
    cap: Duration,
}

impl BackoffState {
    pub fn new(threshold: u32, poll_interval: Duration, cap: Duration) -> Self {
        Self {
            consecutive_errors: 0,
            threshold: threshold.max(1),
            poll_interval,
            cap,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.max_consecutive_errors,
            config.poll_interval,
            config.backoff_cap,
        )
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_errors += 1;
    }

    /// An empty queue is not an error.
    pub fn record_idle(&mut self) {
        self.consecutive_errors = 0;
    }

    /// Back-off owed once the threshold is reached; resets the counter.
    ///
    /// `min(cap, poll_interval * 2^min(errors, 5))`.
    pub fn take_backoff(&mut self) -> Option<Duration> {
        if self.consecutive_errors < self.threshold {
            return None;
        }
        let exponent = self.consecutive_errors.min(MAX_BACKOFF_EXPONENT);
        let delay = self.poll_interval.saturating_mul(2u32.pow(exponent)).min(self.cap);
        self.consecutive_errors = 0;
        Some(delay)
    }

    /// Count a loop-level error and return the sleep before the next try.
    ///
    /// `min(60 s, poll_interval * errors)`.
    pub fn loop_error_delay(&mut self) -> Duration {
        self.consecutive_errors += 1;
        self.poll_interval
            .saturating_mul(self.consecutive_errors)
            .min(LOOP_ERROR_DELAY_CAP)
    }
}

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationEvent {
    JobSucceeded,
    JobFailed,
    Idle,
    LoopError,
}

/// Fetches jobs and runs them one at a time until shutdown.
pub struct PollLoop {
    queue: Arc<dyn QueueApi>,
    runner: JobRunner,
    backoff: BackoffState,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl PollLoop {
    pub fn new(
        queue: Arc<dyn QueueApi>,
        runner: JobRunner,
        backoff: BackoffState,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            runner,
            backoff,
            poll_interval,
            shutdown,
        }
    }

    pub fn backoff(&self) -> &BackoffState {
        &self.backoff
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run one iteration. Returns what happened and how long to sleep.
    pub async fn iterate(&mut self) -> (IterationEvent, Option<Duration>) {
        let event = match self.queue.next_pending().await {
            Ok(Some(job)) => {
                if self.runner.run(&job).await.is_success() {
                    self.backoff.record_success();
                    IterationEvent::JobSucceeded
                } else {
                    self.backoff.record_failure();
                    IterationEvent::JobFailed
                }
            }
            Ok(None) => {
                info!("No pending jobs. Sleeping {}s", self.poll_interval.as_secs());
                self.backoff.record_idle();
                return (IterationEvent::Idle, Some(self.poll_interval));
            }
            Err(e) => {
                let delay = self.backoff.loop_error_delay();
                error!(
                    consecutive_errors = self.backoff.consecutive_errors(),
                    delay_ms = delay.as_millis() as u64,
                    "Main loop error: {}",
                    e
                );
                return (IterationEvent::LoopError, Some(delay));
            }
        };

        let errors = self.backoff.consecutive_errors();
        let backoff = self.backoff.take_backoff();
        if let Some(delay) = backoff {
            warn!(
                consecutive_errors = errors,
                delay_ms = delay.as_millis() as u64,
                "Too many consecutive errors. Backing off"
            );
            metrics::record_backoff();
        }
        (event, backoff)
    }

    /// Sleep for `delay`; returns false when shutdown was requested meanwhile.
    async fn sleep(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            changed = self.shutdown.changed() => match changed {
                Ok(()) => !*self.shutdown.borrow(),
                Err(_) => {
                    tokio::time::sleep(delay).await;
                    true
                }
            },
        }
    }

    /// Loop until shutdown. A job in flight always runs to completion.
    pub async fn run(mut self) {
        info!("Encoder started.");
        while !self.shutdown_requested() {
            let (_, delay) = self.iterate().await;
            if let Some(delay) = delay {
                if !self.sleep(delay).await {
                    break;
                }
            }
        }
        info!("Encoder stopped.");
    }
}
