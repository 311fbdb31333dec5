use quovol_shared::constants::records;
use quovol_shared::errors::{QuovolError, QuovolResult};
use std::path::{Path, PathBuf};

use crate::store::record_key;

/// Directory structure constants
pub mod dirs {
    /// Base directory name for quovol data under the user's home
    pub const QUOVOL_DIR: &str = ".quovol";

    /// Subdirectory holding default mount points (one per volume)
    pub const MOUNTS_DIR: &str = "mounts";

    /// Subdirectory for log files
    pub const LOGS_DIR: &str = "logs";
}

// ============================================================================
// STORAGE LAYOUT (storage root)
// ============================================================================

/// Layout of the storage root.
///
/// Records live directly in the root so a single directory scan enumerates
/// them:
/// - `quobyte.cfg`: manager configuration
/// - `quobyte_volume_<name>.json`: one record per volume
/// - `mounts/<name>`: default mount points
/// - `logs/`: rolling driver log
/// - `.lock`: process-exclusive lock file
#[derive(Clone, Debug)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Manager configuration record: <root>/quobyte.cfg
    pub fn config_path(&self) -> PathBuf {
        self.root
            .join(record_key(records::CONFIG_PREFIX, "", records::CONFIG_SUFFIX))
    }

    /// Root for default mount points: <root>/mounts
    pub fn mounts_dir(&self) -> PathBuf {
        self.root.join(dirs::MOUNTS_DIR)
    }

    /// Default mount point used when the caller supplies no hint.
    pub fn default_mount_point(&self, name: &str) -> PathBuf {
        self.mounts_dir().join(name)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(dirs::LOGS_DIR)
    }

    /// Initialize the directory structure.
    pub fn prepare(&self) -> QuovolResult<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| QuovolError::Storage(format!("failed to create storage root: {e}")))?;

        std::fs::create_dir_all(self.mounts_dir())
            .map_err(|e| QuovolError::Storage(format!("failed to create mounts dir: {e}")))?;

        std::fs::create_dir_all(self.logs_dir())
            .map_err(|e| QuovolError::Storage(format!("failed to create logs dir: {e}")))?;

        Ok(())
    }
}
