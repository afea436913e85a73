//! Storage settings from the environment.

use std::fmt;

use crate::error::{StorageError, StorageResult};

/// Default region when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for an S3 or S3-compatible bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Settings {
    /// Bucket receiving uploads
    pub bucket: String,
    /// Custom S3-compatible endpoint
    pub endpoint_url: Option<String>,
    /// Region
    pub region: String,
    /// Static access key id
    pub access_key_id: Option<String>,
    /// Static secret access key
    pub secret_access_key: Option<String>,
    /// Path-style addressing (`endpoint/bucket/key`)
    pub path_style: bool,
    /// Public base URL under which objects are served
    pub public_url: Option<String>,
}

impl S3Settings {
    /// Settings for `bucket` with the default region and no endpoint.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint_url: None,
            region: DEFAULT_REGION.to_string(),
            access_key_id: None,
            secret_access_key: None,
            path_style: false,
            public_url: None,
        }
    }

    /// Load from `STORAGE_*` environment variables.
    ///
    /// Returns `Ok(None)` when no bucket is configured.
    pub fn from_env() -> StorageResult<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> StorageResult<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let Some(bucket) = get("STORAGE_BUCKET") else {
            return Ok(None);
        };

        let access_key_id = get("STORAGE_ACCESS_KEY_ID");
        let secret_access_key = get("STORAGE_SECRET_ACCESS_KEY");
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::config_error(
                "STORAGE_ACCESS_KEY_ID and STORAGE_SECRET_ACCESS_KEY must be set together",
            ));
        }

        let endpoint_url = get("STORAGE_ENDPOINT_URL").map(|u| u.trim_end_matches('/').to_string());
        if let Some(endpoint) = &endpoint_url {
            url::Url::parse(endpoint).map_err(|e| {
                StorageError::config_error(format!("Invalid STORAGE_ENDPOINT_URL {}: {}", endpoint, e))
            })?;
        }

        let path_style = get("STORAGE_PATH_STYLE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(endpoint_url.is_some());

        Ok(Some(Self {
            bucket,
            endpoint_url,
            region: get("STORAGE_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            access_key_id,
            secret_access_key,
            path_style,
            public_url: get("STORAGE_PUBLIC_URL").map(|u| u.trim_end_matches('/').to_string()),
        }))
    }

    /// Whether a static key pair is configured.
    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

fn mask(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "***"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("access_key_id", &mask(&self.access_key_id))
            .field("secret_access_key", &mask(&self.secret_access_key))
            .field("path_style", &self.path_style)
            .field("public_url", &self.public_url)
            .finish()
    }
}
