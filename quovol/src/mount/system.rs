//! Mount executor backed by the host OS.
//!
//! Mounting shells out to `mount -t <fs_type>` so the filesystem's userspace
//! helper (`mount.quobyte`) handles the FUSE setup. Unmounting is a plain
//! `umount2(2)`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quovol_shared::errors::{QuovolError, QuovolResult};

use super::{MountRequest, Mounter, UnmountRequest};

/// Mount table consulted for idempotent remounts.
const PROC_MOUNTS: &str = "/proc/self/mounts";

/// [`Mounter`] that performs real mounts on the host.
#[derive(Debug, Clone)]
pub struct SystemMounter {
    mount_table: PathBuf,
}

impl SystemMounter {
    pub fn new() -> Self {
        Self {
            mount_table: PathBuf::from(PROC_MOUNTS),
        }
    }

    /// Whether `target` currently appears as a mount point.
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    async fn is_mounted(&self, target: &Path) -> QuovolResult<bool> {
        let table = tokio::fs::read_to_string(&self.mount_table)
            .await
            .map_err(|e| {
                QuovolError::Storage(format!(
                    "Failed to read mount table {}: {}",
                    self.mount_table.display(),
                    e
                ))
            })?;
        Ok(mount_table_contains(&table, target))
    }
}

impl Default for SystemMounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mounter for SystemMounter {
    #[cfg(target_os = "linux")]
    async fn mount(&self, request: &MountRequest) -> QuovolResult<PathBuf> {
        let target = &request.target;

        tokio::fs::create_dir_all(target).await.map_err(|e| QuovolError::Mount {
            name: request.name.clone(),
            reason: format!("failed to create mount point {}: {}", target.display(), e),
        })?;

        if self.is_mounted(target).await? {
            tracing::debug!(
                volume = %request.name,
                target = %target.display(),
                "Target already mounted, skipping mount"
            );
            return Ok(target.clone());
        }

        tracing::info!(
            "Mounting {}: {} → {}",
            request.fs_type,
            request.device,
            target.display()
        );

        let output = mount_command(request)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| QuovolError::Mount {
                name: request.name.clone(),
                reason: format!("failed to run mount: {}", e),
            })?;

        if !output.status.success() {
            return Err(QuovolError::Mount {
                name: request.name.clone(),
                reason: format!(
                    "mount exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(target.clone())
    }

    #[cfg(target_os = "linux")]
    async fn unmount(&self, request: &UnmountRequest) -> QuovolResult<()> {
        use nix::errno::Errno;
        use nix::mount::{MntFlags, umount2};

        let target = request.target.clone();
        let result = tokio::task::spawn_blocking(move || umount2(&target, MntFlags::empty()))
            .await
            .map_err(|e| QuovolError::Internal(format!("unmount task failed: {}", e)))?;

        match result {
            Ok(()) => {}
            // Not a mount point (already gone, e.g. after a host reboot)
            Err(Errno::EINVAL) => {
                tracing::warn!(
                    volume = %request.name,
                    target = %request.target.display(),
                    "Target was not mounted"
                );
            }
            Err(e) => {
                return Err(QuovolError::Unmount {
                    name: request.name.clone(),
                    reason: format!("umount {}: {}", request.target.display(), e),
                });
            }
        }

        if request.remove_target
            && let Err(e) = tokio::fs::remove_dir(&request.target).await
        {
            tracing::warn!(
                target = %request.target.display(),
                "Failed to remove mount point: {}",
                e
            );
        }

        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    async fn mount(&self, request: &MountRequest) -> QuovolResult<PathBuf> {
        Err(QuovolError::Unsupported(format!(
            "mounting {} volumes is only supported on Linux",
            request.fs_type
        )))
    }

    #[cfg(not(target_os = "linux"))]
    async fn unmount(&self, _request: &UnmountRequest) -> QuovolResult<()> {
        Err(QuovolError::Unsupported(
            "unmounting is only supported on Linux".into(),
        ))
    }
}

/// Build `mount -t <fs_type> -- <device> <target>`.
///
/// Device and target follow `--` so neither is parsed as an option.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn mount_command(request: &MountRequest) -> tokio::process::Command {
    let mut command = tokio::process::Command::new("mount");
    command
        .arg("-t")
        .arg(&request.fs_type)
        .arg("--")
        .arg(&request.device)
        .arg(&request.target);
    command
}

/// Check a `/proc/mounts`-format table for `target` as a mount point.
fn mount_table_contains(table: &str, target: &Path) -> bool {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|field| Path::new(&unescape_mount_field(field)) == target)
}

/// Decode the octal escapes (`\040` for space, ...) used in mount tables.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b))
            && let Ok(value) = u8::try_from(
                u16::from(bytes[i + 1] - b'0') * 64
                    + u16::from(bytes[i + 2] - b'0') * 8
                    + u16::from(bytes[i + 3] - b'0'),
            )
        {
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
/dev/sda1 / ext4 rw,relatime 0 0
quobyte@registry:7861/vol1 /var/lib/quovol/mounts/vol1 fuse rw,nosuid,nodev 0 0
quobyte@registry:7861/vol2 /mnt/with\\040space fuse rw 0 0
";

    #[test]
    fn test_mount_table_contains() {
        assert!(mount_table_contains(
            TABLE,
            Path::new("/var/lib/quovol/mounts/vol1")
        ));
        assert!(mount_table_contains(TABLE, Path::new("/mnt/with space")));
        assert!(!mount_table_contains(TABLE, Path::new("/mnt/vol3")));
        assert!(!mount_table_contains(TABLE, Path::new("/var/lib/quovol")));
    }

    #[test]
    fn test_unescape_mount_field() {
        assert_eq!(unescape_mount_field("/plain/path"), "/plain/path");
        assert_eq!(unescape_mount_field("/a\\040b"), "/a b");
        assert_eq!(unescape_mount_field("/tab\\011x"), "/tab\tx");
        // Incomplete escape left as-is
        assert_eq!(unescape_mount_field("/end\\04"), "/end\\04");
    }

    #[test]
    fn test_mount_command_separates_operands() {
        let request = MountRequest {
            name: "-obind,remount".into(),
            device: "-obind,remount".into(),
            fs_type: "quobyte".into(),
            target: PathBuf::from("/var/lib/quovol/mounts/x"),
        };
        let command = mount_command(&request);
        let std_command = command.as_std();
        assert_eq!(std_command.get_program(), "mount");

        let args: Vec<_> = std_command.get_args().collect();
        assert_eq!(
            args,
            ["-t", "quobyte", "--", "-obind,remount", "/var/lib/quovol/mounts/x"]
        );
    }

    #[tokio::test]
    async fn test_is_mounted_reads_table_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let table_path = temp_dir.path().join("mounts");
        std::fs::write(&table_path, TABLE).unwrap();

        let mounter = SystemMounter {
            mount_table: table_path,
        };
        assert!(
            mounter
                .is_mounted(Path::new("/var/lib/quovol/mounts/vol1"))
                .await
                .unwrap()
        );
        assert!(!mounter.is_mounted(Path::new("/mnt/none")).await.unwrap());
    }
}
