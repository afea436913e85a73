//! Per-job temp files.

use std::path::{Path, PathBuf};

use tracing::debug;
use venc_media::fs_utils::{remove_file_quiet, remove_matching};
use venc_models::VideoCode;

/// Whether `file_name` is a temp artifact of the job `code`.
///
/// Matches `{code}.mp4`, `{code}_encoded.mp4`, `{code}_uploaded_src.jpg`
/// and `{code}_thumb_<n>.jpg`.
pub fn is_job_artifact(code: &str, file_name: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(code) else {
        return false;
    };
    match rest {
        ".mp4" | "_encoded.mp4" | "_uploaded_src.jpg" => true,
        _ => rest
            .strip_prefix("_thumb_")
            .and_then(|r| r.strip_suffix(".jpg"))
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
    }
}

/// Paths a job may create under the temp directory.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: PathBuf,
    code: VideoCode,
    tracked: Vec<PathBuf>,
}

impl JobWorkspace {
    pub fn new(dir: impl Into<PathBuf>, code: &VideoCode) -> Self {
        let dir = dir.into();
        let tracked = vec![
            dir.join(format!("{}.mp4", code)),
            dir.join(format!("{}_encoded.mp4", code)),
            dir.join(format!("{}_uploaded_src.jpg", code)),
        ];
        Self {
            dir,
            code: code.clone(),
            tracked,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Downloaded source.
    pub fn input_path(&self) -> &Path {
        &self.tracked[0]
    }

    /// Encoded rendition.
    pub fn output_path(&self) -> &Path {
        &self.tracked[1]
    }

    /// Downloaded seed image.
    pub fn seed_path(&self) -> &Path {
        &self.tracked[2]
    }

    /// Record extra paths for cleanup.
    pub fn track<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.tracked.extend(paths);
    }

    /// Remove tracked paths, then any other artifact of this job.
    ///
    /// Returns how many files were removed.
    pub async fn cleanup(&self) -> usize {
        let mut removed = 0;
        for path in &self.tracked {
            if remove_file_quiet(path).await {
                removed += 1;
            }
        }
        let code = self.code.as_str();
        let swept = remove_matching(&self.dir, |name| is_job_artifact(code, name)).await;
        removed += swept.len();

        debug!(video_code = %self.code, removed, "Cleaned up temp files");
        removed
    }
}
