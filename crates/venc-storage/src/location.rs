//! Recognition of object-storage URLs.
//!
//! A source URL can be fetched straight from the bucket when it points at
//! AWS S3 (virtual-hosted or path-style), at the configured custom endpoint,
//! or under the configured public base URL.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::config::S3Settings;

static AWS_VIRTUAL_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9][a-z0-9.\-]*?)\.s3[.\-]([a-z0-9\-]+)\.amazonaws\.com$").unwrap()
});

static AWS_GLOBAL_VIRTUAL_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z0-9][a-z0-9.\-]*?)\.s3\.amazonaws\.com$").unwrap());

static AWS_PATH_STYLE_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^s3[.\-]([a-z0-9\-]+)\.amazonaws\.com$").unwrap());

/// A bucket/key pair, plus the region when the URL names one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
    pub region: Option<String>,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            region: None,
        }
    }

    fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Maps URLs to [`ObjectLocation`]s.
#[derive(Debug, Clone, Default)]
pub struct UrlResolver {
    bucket: Option<String>,
    endpoint: Option<Url>,
    public_base: Option<String>,
}

impl UrlResolver {
    /// Resolver for the configured bucket, endpoint and public base URL.
    pub fn new(settings: &S3Settings) -> Self {
        Self {
            bucket: Some(settings.bucket.clone()),
            endpoint: settings
                .endpoint_url
                .as_deref()
                .and_then(|e| Url::parse(e).ok()),
            public_base: settings
                .public_url
                .as_deref()
                .map(|u| format!("{}/", u.trim_end_matches('/'))),
        }
    }

    /// Resolve a URL, or `None` when it is not a recognised storage URL.
    pub fn resolve(&self, raw: &str) -> Option<ObjectLocation> {
        let url = Url::parse(raw.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();

        if host.ends_with(".amazonaws.com") {
            return resolve_aws(&host, &url);
        }

        let bucket = self.bucket.as_deref()?;

        if let Some(base) = &self.public_base {
            if let Some(rest) = raw.trim().strip_prefix(base.as_str()) {
                let rest = rest.split(['?', '#']).next().unwrap_or_default();
                return decode_key(rest).map(|key| ObjectLocation::new(bucket, key));
            }
        }

        let endpoint = self.endpoint.as_ref()?;
        let endpoint_host = endpoint.host_str()?.to_ascii_lowercase();
        if url.port_or_known_default() != endpoint.port_or_known_default() {
            return None;
        }

        if host == format!("{}.{}", bucket.to_ascii_lowercase(), endpoint_host) {
            return decode_key(url.path()).map(|key| ObjectLocation::new(bucket, key));
        }

        if host == endpoint_host {
            let path = url.path().trim_start_matches('/');
            let key = match path.split_once('/') {
                Some((first, rest)) if first == bucket => rest,
                _ => path,
            };
            return decode_key(key).map(|key| ObjectLocation::new(bucket, key));
        }

        None
    }
}

fn resolve_aws(host: &str, url: &Url) -> Option<ObjectLocation> {
    if let Some(caps) = AWS_PATH_STYLE_HOST.captures(host) {
        let path = url.path().trim_start_matches('/');
        let (bucket, key) = path.split_once('/')?;
        return decode_key(key).map(|key| ObjectLocation::new(bucket, key).with_region(&caps[1]));
    }
    if let Some(caps) = AWS_VIRTUAL_HOST.captures(host) {
        return decode_key(url.path()).map(|key| ObjectLocation::new(&caps[1], key).with_region(&caps[2]));
    }
    if let Some(caps) = AWS_GLOBAL_VIRTUAL_HOST.captures(host) {
        return decode_key(url.path()).map(|key| ObjectLocation::new(&caps[1], key));
    }
    None
}

fn decode_key(path: &str) -> Option<String> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    urlencoding::decode(trimmed).ok().map(|k| k.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom_resolver() -> UrlResolver {
        let mut settings = S3Settings::new("media");
        settings.endpoint_url = Some("https://s3.example.net".to_string());
        settings.public_url = Some("https://cdn.example.org/files".to_string());
        UrlResolver::new(&settings)
    }

    #[test]
    fn test_aws_virtual_host() {
        let loc = UrlResolver::default()
            .resolve("https://my-bucket.s3.eu-west-1.amazonaws.com/uploads/a%20b.mp4")
            .unwrap();
        assert_eq!(loc.bucket, "my-bucket");
        assert_eq!(loc.key, "uploads/a b.mp4");
        assert_eq!(loc.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_aws_path_style() {
        let loc = UrlResolver::default()
            .resolve("https://s3.us-east-2.amazonaws.com/bucket-x/deep/key.mp4?X-Amz-Signature=1")
            .unwrap();
        assert_eq!(loc, ObjectLocation::new("bucket-x", "deep/key.mp4").with_region("us-east-2"));
    }

    #[test]
    fn test_aws_global_endpoint() {
        let loc = UrlResolver::default()
            .resolve("https://legacy.s3.amazonaws.com/k.mp4")
            .unwrap();
        assert_eq!(loc.bucket, "legacy");
        assert_eq!(loc.region, None);
    }

    #[test]
    fn test_custom_endpoint_path_style() {
        let loc = custom_resolver()
            .resolve("https://s3.example.net/media/uploads/v1.mp4")
            .unwrap();
        assert_eq!(loc, ObjectLocation::new("media", "uploads/v1.mp4"));
    }

    #[test]
    fn test_custom_endpoint_without_bucket_segment() {
        let loc = custom_resolver()
            .resolve("https://s3.example.net/uploads/v1.mp4")
            .unwrap();
        assert_eq!(loc, ObjectLocation::new("media", "uploads/v1.mp4"));
    }

    #[test]
    fn test_custom_endpoint_virtual_host() {
        let loc = custom_resolver()
            .resolve("https://media.s3.example.net/uploads/v1.mp4")
            .unwrap();
        assert_eq!(loc.key, "uploads/v1.mp4");
    }

    #[test]
    fn test_public_base_url() {
        let loc = custom_resolver()
            .resolve("https://cdn.example.org/files/uploads/v1.mp4?token=abc")
            .unwrap();
        assert_eq!(loc, ObjectLocation::new("media", "uploads/v1.mp4"));
    }

    #[test]
    fn test_unrelated_urls_not_recognised() {
        let resolver = custom_resolver();
        assert!(resolver.resolve("https://videos.example.com/v1.mp4").is_none());
        assert!(resolver.resolve("ftp://s3.example.net/media/v1.mp4").is_none());
        assert!(resolver.resolve("http://s3.example.net:9000/media/v1.mp4").is_none());
        assert!(resolver.resolve("https://s3.example.net/").is_none());
        assert!(resolver.resolve("not a url").is_none());
        assert!(UrlResolver::default().resolve("https://s3.example.net/media/v1.mp4").is_none());
    }
}
