//! Wiring of the worker's components from a [`WorkerConfig`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};
use venc_media::{check_ffmpeg, FfmpegToolkit, MediaBackend};
use venc_queue::{QueueApi, QueueClient};
use venc_storage::{ObjectStore, S3Client, S3ObjectStore};

use crate::config::WorkerConfig;
use crate::download::{Downloader, Fetcher};
use crate::error::WorkerResult;
use crate::http::{api_client, download_client};
use crate::poll::{BackoffState, PollLoop};
use crate::runner::{JobRunner, RunnerSettings};

/// Queue client for the configured API.
pub fn queue_client(config: &WorkerConfig) -> WorkerResult<QueueClient> {
    Ok(QueueClient::new(api_client(config)?, config.api_url.clone()))
}

/// Storage collaborator, if a bucket is configured.
///
/// An unreachable bucket is only logged; uploads stay enabled so jobs fail
/// visibly instead of completing without artifacts.
pub async fn object_store(config: &WorkerConfig) -> WorkerResult<Option<Arc<dyn ObjectStore>>> {
    let Some(settings) = config.storage.clone() else {
        warn!("Object storage is not configured; encoded files will not be uploaded");
        return Ok(None);
    };

    let client = S3Client::new(settings).await?;
    match client.check_connectivity().await {
        Ok(()) => info!("Object storage bucket {} is reachable", client.bucket()),
        Err(e) => warn!("Object storage connectivity check failed: {}", e),
    }
    Ok(Some(Arc::new(S3ObjectStore::new(client))))
}

/// Everything `run` needs, assembled once.
pub struct Worker {
    poll: PollLoop,
}

impl Worker {
    pub async fn build(config: &WorkerConfig, shutdown: watch::Receiver<bool>) -> WorkerResult<Self> {
        match check_ffmpeg() {
            Ok(path) => info!("Using ffmpeg at {}", path.display()),
            Err(e) => warn!("FFmpeg check failed: {}", e),
        }

        let queue: Arc<dyn QueueApi> = Arc::new(queue_client(config)?);
        let store = object_store(config).await?;

        let fetcher: Arc<dyn Fetcher> = Arc::new(
            Downloader::new(download_client(config)?)
                .with_store(store.clone())
                .with_origin_auth(config.origin_auth.clone())
                .with_min_free_bytes(config.min_disk_space_bytes()),
        );
        let media: Arc<dyn MediaBackend> = Arc::new(FfmpegToolkit::new());

        let runner = JobRunner::new(
            queue.clone(),
            media,
            fetcher,
            store,
            RunnerSettings::from_config(config),
        );
        let poll = PollLoop::new(
            queue,
            runner,
            BackoffState::from_config(config),
            config.poll_interval,
            shutdown,
        );

        Ok(Self { poll })
    }

    pub async fn run(self) {
        self.poll.run().await;
    }
}
