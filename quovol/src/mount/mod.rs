//! Mount executor capability.
//!
//! The manager decides *where* a volume is mounted and records it; a
//! [`Mounter`] performs the OS-level mount and unmount.

mod system;

pub use system::SystemMounter;

use std::path::PathBuf;

use async_trait::async_trait;
use quovol_shared::errors::QuovolResult;

/// A request to mount one volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    /// Volume name (for error context).
    pub name: String,
    /// Source identifier understood by the filesystem type.
    pub device: String,
    /// Filesystem type, e.g. `quobyte`.
    pub fs_type: String,
    /// Target directory; created if missing.
    pub target: PathBuf,
}

/// A request to unmount one volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmountRequest {
    pub name: String,
    pub target: PathBuf,
    /// Remove the target directory afterwards (default mount points only).
    pub remove_target: bool,
}

/// Performs OS-level mounts.
///
/// `mount` must be idempotent: if the target is already mounted it succeeds
/// without mounting twice. Failures are reported as `Mount` / `Unmount`.
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Mount and return the effective mount point.
    async fn mount(&self, request: &MountRequest) -> QuovolResult<PathBuf>;

    async fn unmount(&self, request: &UnmountRequest) -> QuovolResult<()>;
}
