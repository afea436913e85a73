//! The storage operations a job needs, behind one trait.

use async_trait::async_trait;
use std::path::Path;

use crate::client::S3Client;
use crate::error::{StorageError, StorageResult};
use crate::location::{ObjectLocation, UrlResolver};

/// Object storage as seen by the download and upload steps.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Map a source URL to a bucket/key pair, if it is a storage URL.
    fn resolve(&self, url: &str) -> Option<ObjectLocation>;

    /// Whether direct downloads are possible (static credentials configured).
    fn can_download(&self) -> bool;

    /// Check existence, then stream the object to `dest`. Returns bytes written.
    async fn download(&self, location: &ObjectLocation, dest: &Path) -> StorageResult<u64>;

    /// Upload a local file under `key` in the configured bucket.
    async fn upload(&self, path: &Path, key: &str) -> StorageResult<()>;
}

/// [`ObjectStore`] backed by [`S3Client`].
#[derive(Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    resolver: UrlResolver,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        let resolver = UrlResolver::new(client.settings());
        Self { client, resolver }
    }

    pub fn client(&self) -> &S3Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn resolve(&self, url: &str) -> Option<ObjectLocation> {
        self.resolver.resolve(url)
    }

    fn can_download(&self) -> bool {
        self.client.settings().has_static_credentials()
    }

    async fn download(&self, location: &ObjectLocation, dest: &Path) -> StorageResult<u64> {
        if !self.can_download() {
            return Err(StorageError::MissingCredentials);
        }
        self.client.head_object(location).await?;
        self.client.download_object(location, dest).await
    }

    async fn upload(&self, path: &Path, key: &str) -> StorageResult<()> {
        self.client.upload_file(path, key).await
    }
}
