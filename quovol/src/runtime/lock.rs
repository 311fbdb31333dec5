//! Locks guarding the storage root and individual volumes.
//!
//! - [`RootLock`]: file lock (flock) ensuring only one manager process writes a
//!   given storage root.
//! - [`VolumeLocks`]: in-process lock table keyed by volume name. Mutating
//!   operations on the same volume never interleave; different volumes proceed
//!   concurrently.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quovol_shared::errors::{QuovolError, QuovolResult};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::runtime::constants::filenames;

// ============================================================================
// ROOT LOCK
// ============================================================================

/// A lock guard that holds an exclusive lock on the storage root.
///
/// The lock is automatically released when this guard is dropped,
/// or when the process exits/crashes.
#[derive(Debug)]
pub struct RootLock {
    #[allow(dead_code)] // Held for lifetime, not directly accessed
    file: File,
    path: PathBuf,
}

impl RootLock {
    /// Attempt to acquire an exclusive lock on the storage root.
    ///
    /// # Returns
    /// * `Ok(RootLock)` - Successfully acquired lock
    /// * `Err(...)` - Another manager is already using this root
    pub fn acquire(root: &Path) -> QuovolResult<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| QuovolError::Storage(format!("failed to create storage root: {}", e)))?;

        let lock_path = root.join(filenames::LOCK_FILE);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| QuovolError::Storage(format!("failed to open lock file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(QuovolError::Internal(format!(
                        "Another volume manager is already using storage root: {}",
                        root.display()
                    )));
                } else {
                    return Err(QuovolError::Storage(format!(
                        "failed to acquire lock: {}",
                        err
                    )));
                }
            }
        }

        #[cfg(not(unix))]
        {
            compile_error!("storage root locking requires flock");
        }

        tracing::debug!(lock_path = %lock_path.display(), "Acquired storage root lock");

        Ok(RootLock {
            file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = self.file.as_raw_fd();
            unsafe {
                libc::flock(fd, libc::LOCK_UN);
            }
        }

        tracing::debug!(lock_path = %self.path.display(), "Released storage root lock");
    }
}

// ============================================================================
// PER-VOLUME LOCK TABLE
// ============================================================================

type LockTable = HashMap<String, Arc<AsyncMutex<()>>>;

/// Lazily populated table of per-volume async mutexes.
///
/// Entries are created on first use and pruned when the last holder or
/// waiter for a name goes away, including waiters cancelled mid-wait, so the
/// table only holds names with in-flight operations.
#[derive(Clone, Debug, Default)]
pub struct VolumeLocks {
    table: Arc<parking_lot::Mutex<LockTable>>,
}

impl VolumeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`.
    ///
    /// The table's own mutex is held only to fetch the entry, never across
    /// the await.
    pub async fn lock(&self, name: &str) -> VolumeGuard {
        let entry = {
            let mut table = self.table.lock();
            let mutex = Arc::clone(
                table
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            );
            EntryRef {
                name: name.to_string(),
                table: Arc::clone(&self.table),
                mutex,
            }
        };

        let guard = Arc::clone(&entry.mutex).lock_owned().await;
        tracing::trace!(volume = %name, "Acquired volume lock");

        VolumeGuard {
            guard: Some(guard),
            entry,
        }
    }

    /// Number of names currently tracked.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A counted reference to one table entry, held by waiters and holders.
#[derive(Debug)]
struct EntryRef {
    name: String,
    table: Arc<parking_lot::Mutex<LockTable>>,
    mutex: Arc<AsyncMutex<()>>,
}

impl Drop for EntryRef {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        // Last user when only the table and this reference remain
        if let Some(entry) = table.get(&self.name)
            && Arc::ptr_eq(entry, &self.mutex)
            && Arc::strong_count(entry) == 2
        {
            table.remove(&self.name);
        }
    }
}

/// Exclusive access to one volume. Released on drop.
#[derive(Debug)]
pub struct VolumeGuard {
    // Released before `entry` is dropped
    guard: Option<OwnedMutexGuard<()>>,
    entry: EntryRef,
}

impl VolumeGuard {
    pub fn name(&self) -> &str {
        &self.entry.name
    }
}

impl Drop for VolumeGuard {
    fn drop(&mut self) {
        self.guard.take();
        tracing::trace!(volume = %self.entry.name, "Released volume lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_root_lock() {
        let temp_dir = TempDir::new().unwrap();
        let lock = RootLock::acquire(temp_dir.path()).unwrap();

        assert!(lock.path().exists());
        assert_eq!(lock.path(), temp_dir.path().join(".lock"));
    }

    #[test]
    fn test_root_lock_prevents_second_manager() {
        let temp_dir = TempDir::new().unwrap();
        let dir_path = temp_dir.path().to_path_buf();

        let _lock1 = RootLock::acquire(&dir_path).unwrap();

        let result = RootLock::acquire(&dir_path);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Another volume manager")
        );
    }

    #[test]
    fn test_root_lock_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let dir_path = temp_dir.path().to_path_buf();

        {
            let _lock = RootLock::acquire(&dir_path).unwrap();
        }

        let _lock2 = RootLock::acquire(&dir_path).unwrap();
    }

    #[test]
    fn test_root_lock_across_threads() {
        let temp_dir = TempDir::new().unwrap();
        let dir_path = Arc::new(temp_dir.path().to_path_buf());

        let _lock1 = RootLock::acquire(&dir_path).unwrap();

        let dir_clone = Arc::clone(&dir_path);
        let handle = thread::spawn(move || RootLock::acquire(&dir_clone));

        let result = handle.join().unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_volume_lock_pruned_after_release() {
        let locks = VolumeLocks::new();
        {
            let guard = locks.lock("vol1").await;
            assert_eq!(guard.name(), "vol1");
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_prunes_entry() {
        let locks = VolumeLocks::new();
        let held = locks.lock("vol1").await;

        let mut waiter = Box::pin(locks.lock("vol1"));
        assert!(futures::poll!(waiter.as_mut()).is_pending());

        // The waiter still references the entry after the holder leaves
        drop(held);
        assert_eq!(locks.len(), 1);

        drop(waiter);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_waiter_keeps_holder_entry() {
        let locks = VolumeLocks::new();
        let held = locks.lock("vol1").await;

        let waited = tokio::time::timeout(Duration::from_millis(20), locks.lock("vol1")).await;
        assert!(waited.is_err());
        assert_eq!(locks.len(), 1);

        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_volume_serialized() {
        let locks = VolumeLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("shared").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_volumes_independent() {
        let locks = VolumeLocks::new();

        let _a = locks.lock("a").await;
        // Would deadlock if names shared a lock
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
