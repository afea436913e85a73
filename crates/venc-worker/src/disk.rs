//! Free disk space lookup.

use std::path::{Path, PathBuf};

use sysinfo::Disks;
use tracing::debug;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Result of a free-space check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiskSpace {
    /// At least the required amount is free.
    Sufficient { available_bytes: u64 },
    /// Less than the required amount is free.
    Low { available_bytes: u64, required_bytes: u64 },
    /// The filesystem could not be determined.
    Unknown,
}

impl DiskSpace {
    /// Only a measured shortage counts as low.
    pub fn is_low(&self) -> bool {
        matches!(self, DiskSpace::Low { .. })
    }
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// Nearest existing ancestor, made absolute.
fn resolve(path: &Path) -> Option<PathBuf> {
    path.ancestors().find_map(|p| std::fs::canonicalize(p).ok())
}

/// Available bytes on the filesystem holding `path`.
///
/// The disk with the longest mount point containing the path wins.
pub fn available_space(path: &Path) -> Option<u64> {
    let path = resolve(path)?;
    let disks = Disks::new_with_refreshed_list();

    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Compare the free space at `path` against `required_bytes`.
pub fn check_space(path: &Path, required_bytes: u64) -> DiskSpace {
    match available_space(path) {
        Some(available_bytes) if available_bytes >= required_bytes => {
            DiskSpace::Sufficient { available_bytes }
        }
        Some(available_bytes) => DiskSpace::Low {
            available_bytes,
            required_bytes,
        },
        None => {
            debug!("Could not determine free space for {}", path.display());
            DiskSpace::Unknown
        }
    }
}
