//! S3 client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::S3Settings;
use crate::error::{StorageError, StorageResult};
use crate::location::ObjectLocation;

/// Cache lifetime for uploaded artifacts.
pub const CACHE_CONTROL: &str = "max-age=31536000";

/// Content headers for an uploaded object, chosen by key extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeaders {
    pub content_type: &'static str,
    pub cache_control: Option<&'static str>,
    pub content_disposition: Option<&'static str>,
}

impl ContentHeaders {
    pub fn for_key(key: &str) -> Self {
        let lower = key.to_ascii_lowercase();
        if lower.ends_with(".mp4") {
            Self {
                content_type: "video/mp4",
                cache_control: Some(CACHE_CONTROL),
                content_disposition: Some("inline"),
            }
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            Self {
                content_type: "image/jpeg",
                cache_control: Some(CACHE_CONTROL),
                content_disposition: None,
            }
        } else {
            Self {
                content_type: "application/octet-stream",
                cache_control: None,
                content_disposition: None,
            }
        }
    }
}

/// S3 / S3-compatible storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    settings: S3Settings,
}

impl S3Client {
    /// Create a new client.
    ///
    /// Static credentials are used when configured; otherwise the SDK's
    /// default provider chain.
    pub async fn new(settings: S3Settings) -> StorageResult<Self> {
        let mut builder = match (&settings.access_key_id, &settings.secret_access_key) {
            (Some(key_id), Some(secret)) => {
                let credentials = Credentials::new(key_id, secret, None, None, "venc-static");
                Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
            }
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(settings.region.clone()))
                    .load()
                    .await;
                Builder::from(&shared)
            }
        };

        builder = builder
            .region(Region::new(settings.region.clone()))
            .force_path_style(settings.path_style);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            settings,
        })
    }

    /// Create from environment variables, or `None` when no bucket is configured.
    pub async fn from_env() -> StorageResult<Option<Self>> {
        match S3Settings::from_env()? {
            Some(settings) => Ok(Some(Self::new(settings).await?)),
            None => Ok(None),
        }
    }

    /// Settings this client was built from.
    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }

    /// Bucket receiving uploads.
    pub fn bucket(&self) -> &str {
        &self.settings.bucket
    }

    /// Client for a specific region, reusing everything else.
    fn client_for(&self, region: Option<&str>) -> Client {
        match region {
            Some(region) if region != self.settings.region && self.settings.endpoint_url.is_none() => {
                let conf = self
                    .client
                    .config()
                    .to_builder()
                    .region(Region::new(region.to_string()))
                    .build();
                Client::from_conf(conf)
            }
            _ => self.client.clone(),
        }
    }

    /// Check that the upload bucket is reachable with the configured credentials.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.settings.bucket)
            .send()
            .await
            .map_err(|e| StorageError::BucketUnavailable(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    /// Size of an object, failing with [`StorageError::NotFound`] when absent.
    pub async fn head_object(&self, location: &ObjectLocation) -> StorageResult<u64> {
        let response = self
            .client_for(location.region.as_deref())
            .head_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| {
                let context = DisplayErrorContext(&e).to_string();
                match e.into_service_error() {
                    HeadObjectError::NotFound(_) => StorageError::not_found(location.to_string()),
                    _ => StorageError::download_failed(context),
                }
            })?;

        Ok(response.content_length().and_then(|n| u64::try_from(n).ok()).unwrap_or(0))
    }

    /// Stream an object to `dest`. Returns the number of bytes written.
    pub async fn download_object(&self, location: &ObjectLocation, dest: &Path) -> StorageResult<u64> {
        debug!("Downloading {} to {}", location, dest.display());

        let response = self
            .client_for(location.region.as_deref())
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| StorageError::download_failed(DisplayErrorContext(&e).to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(dest).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        info!("Downloaded {} ({} bytes) to {}", location, written, dest.display());
        Ok(written)
    }

    /// Upload a file with content headers chosen from the key.
    pub async fn upload_file(&self, path: &Path, key: &str) -> StorageResult<()> {
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?;
        let headers = ContentHeaders::for_key(key);

        self.client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .body(body)
            .content_type(headers.content_type)
            .set_cache_control(headers.cache_control.map(str::to_string))
            .set_content_disposition(headers.content_disposition.map(str::to_string))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(DisplayErrorContext(&e).to_string()))?;

        info!(
            url = %self.public_url(key),
            "Uploaded {} to s3://{}/{}",
            path.display(),
            self.settings.bucket,
            key
        );
        Ok(())
    }

    /// URL under which an uploaded key is reachable.
    pub fn public_url(&self, key: &str) -> String {
        object_url(&self.settings, key)
    }
}

/// Public URL of `key` in the configured bucket.
fn object_url(settings: &S3Settings, key: &str) -> String {
    if let Some(base) = &settings.public_url {
        return format!("{}/{}", base.trim_end_matches('/'), key);
    }
    match &settings.endpoint_url {
        Some(endpoint) if settings.path_style => {
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), settings.bucket, key)
        }
        Some(endpoint) => {
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/');
            format!("https://{}.{}/{}", settings.bucket, host, key)
        }
        None => format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            settings.bucket, settings.region, key
        ),
    }
}
