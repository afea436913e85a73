//! HTTP clients shared by the queue client and the downloader.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{redirect, Certificate, Client, ClientBuilder};
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Timeout for queue API calls.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest a source download may sit idle between reads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const USER_AGENT: &str = concat!("venc-worker/", env!("CARGO_PKG_VERSION"));

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

fn base_builder(config: &WorkerConfig) -> WorkerResult<ClientBuilder> {
    let mut builder = Client::builder()
        .default_headers(default_headers())
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(Duration::from_secs(90));

    if !config.verify_tls {
        warn!("TLS certificate verification is DISABLED. Use only for local development!");
        builder = builder.danger_accept_invalid_certs(true);
    } else if let Some(path) = &config.ca_bundle {
        let pem = std::fs::read(path).map_err(|e| {
            WorkerError::config(format!("Cannot read CA bundle {}: {}", path.display(), e))
        })?;
        let cert = Certificate::from_pem(&pem).map_err(|e| {
            WorkerError::config(format!("Invalid CA bundle {}: {}", path.display(), e))
        })?;
        info!("Using custom CA bundle: {}", path.display());
        builder = builder.add_root_certificate(cert);
    }

    Ok(builder)
}

/// Client for queue API calls. Redirects are returned, not followed.
pub fn api_client(config: &WorkerConfig) -> WorkerResult<Client> {
    Ok(base_builder(config)?
        .timeout(API_TIMEOUT)
        .redirect(redirect::Policy::none())
        .build()?)
}

/// Client for source downloads. Redirects are followed.
///
/// Only stalls are timed out; a large body may take as long as it needs.
pub fn download_client(config: &WorkerConfig) -> WorkerResult<Client> {
    Ok(download_builder(config, DOWNLOAD_TIMEOUT)?.build()?)
}

fn download_builder(
    config: &WorkerConfig,
    read_timeout: Duration,
) -> WorkerResult<ClientBuilder> {
    Ok(base_builder(config)?
        .read_timeout(read_timeout)
        .redirect(redirect::Policy::limited(10)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{Downloader, Fetcher};
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use venc_queue::RetryPolicy;

    /// Serve one response whose body arrives a byte at a time, `gap` apart.
    async fn trickle_server(body_len: usize, gap: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let mut request = Vec::new();
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: {}\r\n\r\n",
                body_len
            );
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for _ in 0..body_len {
                tokio::time::sleep(gap).await;
                if socket.write_all(b"v").await.is_err() || socket.flush().await.is_err() {
                    return;
                }
            }
        });
        format!("http://{}/video.mp4", addr)
    }

    fn single_attempt() -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(1)
            .with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_clients_build() {
        let config = WorkerConfig::new("http://localhost:8000/api");
        assert!(api_client(&config).is_ok());
        assert!(download_client(&config).is_ok());
    }

    #[test]
    fn test_missing_ca_bundle_is_config_error() {
        let mut config = WorkerConfig::new("http://localhost:8000/api");
        config.ca_bundle = Some("/nonexistent/ca.pem".into());
        assert!(matches!(api_client(&config), Err(WorkerError::Config(_))));
    }

    #[tokio::test]
    async fn test_slow_download_outlives_read_timeout() {
        let config = WorkerConfig::new("http://localhost:8000/api");
        let client = download_builder(&config, Duration::from_millis(300))
            .unwrap()
            .build()
            .unwrap();
        // 20 bytes at 80 ms each keeps the transfer alive well past 300 ms.
        let url = trickle_server(20, Duration::from_millis(80)).await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("abc.mp4");

        let started = std::time::Instant::now();
        let written = Downloader::new(client)
            .with_retry(single_attempt())
            .fetch(&url, &dest)
            .await
            .unwrap();

        assert_eq!(written, 20);
        assert!(started.elapsed() > Duration::from_millis(300));
        assert_eq!(std::fs::read(&dest).unwrap(), vec![b'v'; 20]);
    }

    #[tokio::test]
    async fn test_stalled_download_times_out() {
        let config = WorkerConfig::new("http://localhost:8000/api");
        let client = download_builder(&config, Duration::from_millis(200))
            .unwrap()
            .build()
            .unwrap();
        let url = trickle_server(2, Duration::from_secs(2)).await;
        let dir = TempDir::new().unwrap();

        let result = Downloader::new(client)
            .with_retry(single_attempt())
            .fetch(&url, &dir.path().join("abc.mp4"))
            .await;

        assert!(result.is_err());
    }
}
