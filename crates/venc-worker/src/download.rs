//! Source downloads.
//!
//! A URL that names an object in the configured storage is fetched with the
//! storage SDK; everything else, and any failed storage attempt, goes over
//! plain HTTP.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use venc_queue::{retry_async, RetryPolicy};
use venc_storage::ObjectStore;

use crate::config::OriginAuth;
use crate::disk::{bytes_to_gb, check_space, DiskSpace};
use crate::error::{WorkerError, WorkerResult};

/// Fetches a URL into a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` to `dest`. On success `dest` exists and is non-empty.
    async fn fetch(&self, url: &str, dest: &Path) -> WorkerResult<u64>;
}

/// Retry policy for downloads: 3 attempts, 5 s base delay.
pub fn download_retry_policy() -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(3)
        .with_base_delay(Duration::from_secs(5))
}

/// Storage-first downloader with HTTP fallback.
pub struct Downloader {
    http: Client,
    store: Option<Arc<dyn ObjectStore>>,
    origin_auth: OriginAuth,
    min_free_bytes: u64,
    retry: RetryPolicy,
}

impl Downloader {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            store: None,
            origin_auth: OriginAuth::default(),
            min_free_bytes: 0,
            retry: download_retry_policy(),
        }
    }

    pub fn with_store(mut self, store: Option<Arc<dyn ObjectStore>>) -> Self {
        self.store = store;
        self
    }

    pub fn with_origin_auth(mut self, origin_auth: OriginAuth) -> Self {
        self.origin_auth = origin_auth;
        self
    }

    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Try the storage SDK. `Ok(None)` means "fall back to HTTP".
    ///
    /// Low disk space is reported before any bytes are written and does not
    /// fall back, since the HTTP path would hit the same wall.
    async fn fetch_from_store(&self, url: &str, dest: &Path) -> WorkerResult<Option<u64>> {
        let Some(store) = self.store.as_ref() else {
            return Ok(None);
        };
        if !store.can_download() {
            return Ok(None);
        }
        let Some(location) = store.resolve(url) else {
            return Ok(None);
        };

        self.ensure_space(dest)?;

        match store.download(&location, dest).await {
            Ok(bytes) if bytes > 0 => {
                info!("Downloaded {} via storage ({} bytes)", location, bytes);
                Ok(Some(bytes))
            }
            Ok(_) => {
                warn!("Storage download of {} was empty; falling back to HTTP", location);
                Ok(None)
            }
            Err(e) => {
                warn!("Storage download of {} failed, falling back to HTTP: {}", location, e);
                Ok(None)
            }
        }
    }

    fn ensure_space(&self, dest: &Path) -> WorkerResult<()> {
        if self.min_free_bytes == 0 {
            return Ok(());
        }
        let dir = dest.parent().unwrap_or(dest);
        match check_space(dir, self.min_free_bytes) {
            DiskSpace::Low {
                available_bytes,
                required_bytes,
            } => Err(WorkerError::InsufficientDisk {
                available_gb: bytes_to_gb(available_bytes),
                required_gb: bytes_to_gb(required_bytes),
            }),
            // Unknown fails open.
            DiskSpace::Sufficient { .. } | DiskSpace::Unknown => Ok(()),
        }
    }

    async fn fetch_over_http(&self, url: &str, dest: &Path) -> WorkerResult<u64> {
        let mut request = self.http.get(url);
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        if let Some(value) = host.as_deref().and_then(|h| self.origin_auth.header_for(h)) {
            debug!("Attaching origin credentials for {}", url);
            request = request.header(AUTHORIZATION, value);
        }

        let mut response = request.send().await?;
        let status = response.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Err(WorkerError::non_retryable(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }
        if !status.is_success() {
            return Err(WorkerError::download_failed(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        self.ensure_space(dest)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(WorkerError::retryable("Downloaded file is empty."));
        }
        info!("Downloaded {} ({} bytes) to {}", url, written, dest.display());
        Ok(written)
    }

    async fn fetch_once(&self, url: &str, dest: &Path) -> WorkerResult<u64> {
        if let Some(bytes) = self.fetch_from_store(url, dest).await? {
            return Ok(bytes);
        }
        self.fetch_over_http(url, dest).await
    }
}

#[async_trait]
impl Fetcher for Downloader {
    async fn fetch(&self, url: &str, dest: &Path) -> WorkerResult<u64> {
        info!("Downloading: {}", url);
        retry_async(&self.retry, "download", WorkerError::is_retryable, || {
            self.fetch_once(url, dest)
        })
        .await
    }
}
