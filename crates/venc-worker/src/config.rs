//! Worker configuration.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use venc_storage::S3Settings;

use crate::error::{WorkerError, WorkerResult};

/// Credentials sent to an origin host that protects its source files.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OriginAuth {
    /// Host (or host suffix) the credentials belong to
    pub host: Option<String>,
    /// Sent as `Authorization: Bearer <token>`
    pub token: Option<String>,
    /// Sent as `Authorization: AccessKey <key>` when no token is set
    pub access_key: Option<String>,
}

impl OriginAuth {
    /// Authorization header value for a request to `host`.
    pub fn header_for(&self, host: &str) -> Option<String> {
        let origin = self.host.as_deref()?;
        let host = host.to_ascii_lowercase();
        let origin = origin.to_ascii_lowercase();
        if host != origin && !host.ends_with(&format!(".{}", origin)) {
            return None;
        }
        match (&self.token, &self.access_key) {
            (Some(token), _) => Some(format!("Bearer {}", token)),
            (None, Some(key)) => Some(format!("AccessKey {}", key)),
            (None, None) => None,
        }
    }
}

impl fmt::Debug for OriginAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginAuth")
            .field("host", &self.host)
            .field("token", &mask(&self.token))
            .field("access_key", &mask(&self.access_key))
            .finish()
    }
}

fn mask(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "***"
    } else {
        "<unset>"
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue backend base URL, including any path prefix
    pub api_url: String,
    /// Directory for per-job temp files
    pub temp_dir: PathBuf,
    /// Idle sleep when the queue is empty
    pub poll_interval: Duration,
    /// Job retry budget when a job does not carry its own
    pub max_retries: u32,
    /// Consecutive failures that trigger a back-off
    pub max_consecutive_errors: u32,
    /// Ceiling of the exponential back-off
    pub backoff_cap: Duration,
    /// Free space required before a download is written
    pub min_disk_space_gb: f64,
    /// Thumbnails required for a job to proceed
    pub min_thumbnails: usize,
    /// Target thumbnail count unless the job overrides it
    pub thumbnail_count: u32,
    pub verify_tls: bool,
    /// Extra PEM root certificate
    pub ca_bundle: Option<PathBuf>,
    /// Prometheus scrape address
    pub metrics_addr: Option<SocketAddr>,
    pub log_level: String,
    pub origin_auth: OriginAuth,
    /// Object storage; `None` disables direct downloads and uploads
    pub storage: Option<S3Settings>,
}

impl WorkerConfig {
    /// Create config with defaults for everything but the API URL.
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            temp_dir: PathBuf::from("./temp"),
            poll_interval: Duration::from_secs(30),
            max_retries: 3,
            max_consecutive_errors: 5,
            backoff_cap: Duration::from_secs(300),
            min_disk_space_gb: 2.0,
            min_thumbnails: 1,
            thumbnail_count: 5,
            verify_tls: true,
            ca_bundle: None,
            metrics_addr: None,
            log_level: "info".to_string(),
            origin_auth: OriginAuth::default(),
            storage: None,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parsed = |key: &str| get(key).and_then(|v| v.parse::<u64>().ok());

        let api_url = get("ENCODER_API_URL").ok_or_else(|| {
            WorkerError::config("ENCODER_API_URL is required (queue backend base URL)")
        })?;
        reqwest::Url::parse(&api_url)
            .map_err(|e| WorkerError::config(format!("Invalid ENCODER_API_URL {}: {}", api_url, e)))?;

        let mut config = Self::new(api_url);

        if let Some(dir) = get("ENCODER_TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parsed("ENCODER_POLL_INTERVAL_SECS").filter(|s| *s > 0) {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(n) = parsed("ENCODER_MAX_RETRIES") {
            config.max_retries = u32::try_from(n).unwrap_or(config.max_retries);
        }
        if let Some(n) = parsed("ENCODER_MAX_CONSECUTIVE_ERRORS").filter(|n| *n > 0) {
            config.max_consecutive_errors = u32::try_from(n).unwrap_or(config.max_consecutive_errors);
        }
        if let Some(secs) = parsed("ENCODER_BACKOFF_CAP_SECS") {
            config.backoff_cap = Duration::from_secs(secs);
        }
        if let Some(gb) = get("ENCODER_MIN_DISK_SPACE_GB")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|gb| gb.is_finite() && *gb >= 0.0)
        {
            config.min_disk_space_gb = gb;
        }
        if let Some(n) = parsed("ENCODER_MIN_THUMBNAILS") {
            config.min_thumbnails = usize::try_from(n).unwrap_or(config.min_thumbnails);
        }
        if let Some(n) = parsed("ENCODER_THUMBNAIL_COUNT").filter(|n| *n > 0) {
            config.thumbnail_count = u32::try_from(n).unwrap_or(config.thumbnail_count);
        }
        if let Some(flag) = get("ENCODER_VERIFY_TLS") {
            config.verify_tls = !matches!(flag.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
        config.ca_bundle = get("ENCODER_CA_BUNDLE").map(PathBuf::from);
        if let Some(addr) = get("ENCODER_METRICS_ADDR") {
            config.metrics_addr = Some(addr.parse().map_err(|e| {
                WorkerError::config(format!("Invalid ENCODER_METRICS_ADDR {}: {}", addr, e))
            })?);
        }
        if let Some(level) = get("ENCODER_LOG_LEVEL") {
            config.log_level = level.to_ascii_lowercase();
        }

        config.origin_auth = OriginAuth {
            host: get("ORIGIN_AUTH_HOST"),
            token: get("ORIGIN_AUTH_TOKEN"),
            access_key: get("ORIGIN_ACCESS_KEY"),
        };
        config.storage = S3Settings::from_lookup(&lookup)
            .map_err(|e| WorkerError::config(e.to_string()))?;

        Ok(config)
    }

    /// Minimum free space in bytes.
    pub fn min_disk_space_bytes(&self) -> u64 {
        (self.min_disk_space_gb * 1024.0 * 1024.0 * 1024.0) as u64
    }
}

/// Human-readable listing with secrets masked.
impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "API URL:                {}", self.api_url)?;
        writeln!(f, "Temp dir:               {}", self.temp_dir.display())?;
        writeln!(f, "Poll interval:          {}s", self.poll_interval.as_secs())?;
        writeln!(f, "Max retries:            {}", self.max_retries)?;
        writeln!(f, "Max consecutive errors: {}", self.max_consecutive_errors)?;
        writeln!(f, "Back-off cap:           {}s", self.backoff_cap.as_secs())?;
        writeln!(f, "Min disk space:         {:.1} GB", self.min_disk_space_gb)?;
        writeln!(f, "Min thumbnails:         {}", self.min_thumbnails)?;
        writeln!(f, "Thumbnail count:        {}", self.thumbnail_count)?;
        writeln!(f, "Verify TLS:             {}", self.verify_tls)?;
        if let Some(ca) = &self.ca_bundle {
            writeln!(f, "CA bundle:              {}", ca.display())?;
        }
        if let Some(addr) = &self.metrics_addr {
            writeln!(f, "Metrics address:        {}", addr)?;
        }
        writeln!(f, "Log level:              {}", self.log_level)?;
        if let Some(host) = &self.origin_auth.host {
            writeln!(
                f,
                "Origin auth:            {} (token {}, access key {})",
                host,
                mask(&self.origin_auth.token),
                mask(&self.origin_auth.access_key)
            )?;
        }
        match &self.storage {
            Some(s) => {
                writeln!(f, "Storage bucket:         {}", s.bucket)?;
                writeln!(f, "Storage region:         {}", s.region)?;
                if let Some(endpoint) = &s.endpoint_url {
                    writeln!(f, "Storage endpoint:       {}", endpoint)?;
                }
                writeln!(f, "Storage path style:     {}", s.path_style)?;
                write!(
                    f,
                    "Storage credentials:    {}",
                    if s.has_static_credentials() { "static (***)" } else { "default chain" }
                )
            }
            None => write!(f, "Storage:                not configured"),
        }
    }
}
