//! Mocks and fakes shared by the worker integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use venc_media::{
    thumbnail_file_name, EncodeResult, MediaBackend, MediaError, MediaProbe, MediaResult,
    ThumbnailRequest,
};
use venc_models::{EncodingJob, EncodingOptions, VideoCode, VideoMetadata};
use venc_queue::{QueueApi, QueueResult, RetryPolicy};
use venc_storage::{ObjectLocation, ObjectStore, StorageResult};
use venc_worker::download::Fetcher;
use venc_worker::{RunnerSettings, WorkerResult};

mock! {
    pub Queue {}

    #[async_trait]
    impl QueueApi for Queue {
        async fn next_pending(&self) -> QueueResult<Option<EncodingJob>>;
        async fn mark_processing(&self, code: &VideoCode) -> QueueResult<()>;
        async fn mark_completed(
            &self,
            code: &VideoCode,
            output_file_path: &str,
            thumbnail_paths: &[String],
        ) -> QueueResult<()>;
        async fn mark_failed(&self, code: &VideoCode, error_message: &str) -> QueueResult<()>;
        async fn activate_video(&self, code: &VideoCode) -> QueueResult<()>;
        async fn update_metadata(&self, code: &VideoCode, metadata: &VideoMetadata) -> QueueResult<()>;
    }
}

mock! {
    pub Store {}

    #[async_trait]
    impl ObjectStore for Store {
        fn resolve(&self, url: &str) -> Option<ObjectLocation>;
        fn can_download(&self) -> bool;
        async fn download(&self, location: &ObjectLocation, dest: &Path) -> StorageResult<u64>;
        async fn upload(&self, path: &Path, key: &str) -> StorageResult<()>;
    }
}

mock! {
    pub Fetch {}

    #[async_trait]
    impl Fetcher for Fetch {
        async fn fetch(&self, url: &str, dest: &Path) -> WorkerResult<u64>;
    }
}

/// Fetcher that writes a small file for every URL.
pub fn writing_fetcher() -> MockFetch {
    let mut fetcher = MockFetch::new();
    fetcher.expect_fetch().returning(|_, dest| {
        std::fs::write(dest, b"source-bytes").unwrap();
        Ok(12)
    });
    fetcher
}

/// Queue accepting the best-effort calls of a run.
pub fn lenient_queue() -> MockQueue {
    let mut queue = MockQueue::new();
    queue.expect_mark_processing().returning(|_| Ok(()));
    queue.expect_update_metadata().returning(|_, _| Ok(()));
    queue.expect_activate_video().returning(|_| Ok(()));
    queue
}

/// Media backend writing real files without FFmpeg.
pub struct FakeMedia {
    /// How many thumbnails to produce at most
    pub thumbnails: usize,
    pub encode_error: Mutex<Option<MediaError>>,
    pub seed_seen: Mutex<Option<PathBuf>>,
}

impl FakeMedia {
    pub fn new(thumbnails: usize) -> Self {
        Self {
            thumbnails,
            encode_error: Mutex::new(None),
            seed_seen: Mutex::new(None),
        }
    }

    pub fn failing(thumbnails: usize, error: MediaError) -> Self {
        let media = Self::new(thumbnails);
        *media.encode_error.lock().unwrap() = Some(error);
        media
    }
}

#[async_trait]
impl MediaBackend for FakeMedia {
    async fn probe(&self, _path: &Path) -> MediaProbe {
        MediaProbe {
            is_valid: true,
            duration: Some(12.7),
            width: Some(1280),
            height: Some(720),
        }
    }

    async fn compose_thumbnails(&self, request: &ThumbnailRequest<'_>) -> Vec<PathBuf> {
        *self.seed_seen.lock().unwrap() = request.seed_image.map(Path::to_path_buf);
        (1..=request.count.min(self.thumbnails))
            .map(|idx| {
                let path = request
                    .output_dir
                    .join(thumbnail_file_name(request.video_code, idx));
                std::fs::write(&path, b"jpeg").unwrap();
                path
            })
            .collect()
    }

    async fn encode(
        &self,
        _input: &Path,
        output: &Path,
        _options: &EncodingOptions,
    ) -> MediaResult<EncodeResult> {
        // Partial output is left behind on failure, like an interrupted FFmpeg.
        std::fs::write(output, b"mp4").unwrap();
        if let Some(error) = self.encode_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(EncodeResult {
            output: output.to_path_buf(),
            width: 1280,
            height: 720,
        })
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new()
        .with_base_delay(Duration::from_millis(1))
        .with_jitter(Duration::ZERO)
}

pub fn settings(temp_dir: &Path) -> RunnerSettings {
    RunnerSettings {
        temp_dir: temp_dir.to_path_buf(),
        min_thumbnails: 1,
        thumbnail_count: 3,
        default_max_retries: 3,
        upload_retry: fast_retry(),
    }
}

pub fn job(code: &str) -> EncodingJob {
    EncodingJob::new(code, Some(format!("https://cdn.example.com/src/{}.mp4", code)))
}

/// Names of the files left in `dir`.
pub fn leftover_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
