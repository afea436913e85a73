//! Filesystem helpers for temp-file bookkeeping.
//!
//! Removal here is always best-effort: failures are logged and never
//! surfaced, since cleanup runs on paths that may or may not exist.

use std::path::{Path, PathBuf};
use tokio::fs;

/// Remove a file if it exists. Returns true when a file was removed.
pub async fn remove_file_quiet(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed temp file: {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Remove every regular file directly inside `dir` whose name satisfies `matches`.
///
/// Returns the removed paths. A missing or unreadable directory removes nothing.
pub async fn remove_matching<F>(dir: impl AsRef<Path>, matches: F) -> Vec<PathBuf>
where
    F: Fn(&str) -> bool,
{
    let dir = dir.as_ref();
    let mut removed = Vec::new();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot scan {} for leftovers: {}", dir.display(), e);
            return removed;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Error while scanning {}: {}", dir.display(), e);
                break;
            }
        };

        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        if is_file && matches(name) && remove_file_quiet(entry.path()).await {
            removed.push(entry.path());
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_file_quiet() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.mp4");
        fs::write(&file, b"x").await.unwrap();

        assert!(remove_file_quiet(&file).await);
        assert!(!file.exists());
        assert!(!remove_file_quiet(&file).await, "second removal finds nothing");
    }

    #[tokio::test]
    async fn test_remove_matching_only_touches_matches() {
        let dir = TempDir::new().unwrap();
        for name in ["keep.mp4", "drop_1.jpg", "drop_2.jpg"] {
            fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        fs::create_dir(dir.path().join("drop_dir")).await.unwrap();

        let removed = remove_matching(dir.path(), |name| name.starts_with("drop")).await;

        assert_eq!(removed.len(), 2);
        assert!(dir.path().join("keep.mp4").exists());
        assert!(dir.path().join("drop_dir").exists());
    }

    #[tokio::test]
    async fn test_remove_matching_missing_dir() {
        assert!(remove_matching("/no/such/dir", |_| true).await.is_empty());
    }
}
