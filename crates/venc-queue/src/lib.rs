//! Client for the encoding queue backend.
//!
//! This crate provides:
//! - [`QueueClient`], a REST client for the queue and video endpoints
//! - [`QueueApi`], the subset of operations the job pipeline depends on
//! - A generic retry policy with exponential backoff and jitter

pub mod client;
pub mod error;
pub mod retry;

pub use client::{QueueApi, QueueClient};
pub use error::{QueueError, QueueResult};
pub use retry::{retry_async, RetryPolicy};
