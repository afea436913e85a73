//! S3-compatible object storage for the encoding worker.
//!
//! This crate provides:
//! - Settings loaded from `STORAGE_*` environment variables
//! - A streaming S3 client for source downloads and artifact uploads
//! - Recognition of storage URLs (AWS and custom endpoints)

pub mod client;
pub mod config;
pub mod error;
pub mod location;
pub mod store;

pub use client::{ContentHeaders, S3Client};
pub use config::S3Settings;
pub use error::{StorageError, StorageResult};
pub use location::{ObjectLocation, UrlResolver};
pub use store::{ObjectStore, S3ObjectStore};
