//! Volume lifecycle manager.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quovol_shared::errors::{QuovolError, QuovolResult};

use crate::mount::{MountRequest, Mounter, SystemMounter, UnmountRequest};
use crate::remote::{CreateVolumeRequest, RemoteConnector, RemoteVolumes};
use crate::runtime::constants::{driver, info_keys};
use crate::runtime::layout::StorageLayout;
use crate::runtime::lock::{RootLock, VolumeLocks};
use crate::runtime::options::{
    ApiSettings, HostResolver, ManagerConfig, ManagerOptions, SystemResolver,
};
use crate::store::{RecordStore, VolumeRegistry};
use crate::util::{init_logging_for, with_timeout};
use crate::volume::{MountPlan, VolumeInfo, VolumeRecord, validate_volume_name};

// ============================================================================
// PUBLIC API
// ============================================================================

/// Manages the lifecycle of Quobyte volumes on this node.
///
/// **Lock Behavior**: Only one `VolumeManager` can use a given storage root at
/// a time. The filesystem lock is released when the last clone is dropped.
///
/// **Cloning**: cheap via `Arc`; all clones share the same state, so a single
/// instance can be handed to every request handler.
///
/// **Concurrency**: mutating operations take a per-volume lock for their full
/// duration. Reads take no lock and rely on atomic record replacement.
#[derive(Clone)]
pub struct VolumeManager {
    inner: ManagerInner,
}

pub type ManagerInner = Arc<ManagerInnerImpl>;

/// Shared manager state. Nothing here changes after initialization; volume
/// state lives only in the record store.
pub struct ManagerInnerImpl {
    pub(crate) layout: StorageLayout,
    pub(crate) store: RecordStore,
    pub(crate) registry: VolumeRegistry,
    pub(crate) config: ManagerConfig,
    pub(crate) remote: Arc<dyn RemoteVolumes>,
    pub(crate) mounter: Arc<dyn Mounter>,
    pub(crate) locks: VolumeLocks,
    _root_lock: RootLock,
}

// ============================================================================
// INITIALIZATION
// ============================================================================

impl VolumeManager {
    /// Bring up a manager on `options.root_dir`.
    ///
    /// Loads the persisted configuration, or validates the bootstrap options
    /// and persists a new one, then remounts every volume recorded as
    /// mounted. The manager is returned only once recovery has succeeded.
    ///
    /// # Errors
    ///
    /// - `Config` if bootstrap options are missing or invalid
    /// - `Internal` if another manager already holds the storage root
    /// - `Storage` if the root cannot be prepared or a record is unreadable
    /// - `Mount` if a previously mounted volume cannot be remounted
    pub async fn initialize(
        options: ManagerOptions,
        connector: &dyn RemoteConnector,
        mounter: Arc<dyn Mounter>,
        resolver: &dyn HostResolver,
    ) -> QuovolResult<Self> {
        if !options.root_dir.is_absolute() {
            return Err(QuovolError::Config(format!(
                "storage root must be an absolute path, got: {}",
                options.root_dir.display()
            )));
        }

        let layout = StorageLayout::new(options.root_dir.clone());
        layout.prepare()?;

        init_logging_for(&layout)?;

        let root_lock = RootLock::acquire(layout.root())?;

        let store = RecordStore::new(layout.root().to_path_buf());
        let config = Self::load_or_bootstrap_config(&store, &layout, &options, resolver).await?;

        let api = ApiSettings::resolve(&config, &options.bootstrap)?;
        let remote = connector.connect(&api)?;

        let manager = Self {
            inner: Arc::new(ManagerInnerImpl {
                registry: VolumeRegistry::new(store.clone()),
                layout,
                store,
                config,
                remote,
                mounter,
                locks: VolumeLocks::new(),
                _root_lock: root_lock,
            }),
        };

        manager.recover().await?;

        tracing::info!(
            root = %manager.inner.layout.root().display(),
            registries = %manager.inner.config.registries,
            "Volume manager initialized"
        );

        Ok(manager)
    }

    /// [`initialize`](Self::initialize) with the host mount executor and the
    /// system resolver.
    pub async fn with_system(
        options: ManagerOptions,
        connector: &dyn RemoteConnector,
    ) -> QuovolResult<Self> {
        Self::initialize(
            options,
            connector,
            Arc::new(SystemMounter::new()),
            &SystemResolver,
        )
        .await
    }

    async fn load_or_bootstrap_config(
        store: &RecordStore,
        layout: &StorageLayout,
        options: &ManagerOptions,
        resolver: &dyn HostResolver,
    ) -> QuovolResult<ManagerConfig> {
        if store.exists::<ManagerConfig>("")? {
            let config = store.load::<ManagerConfig>("")?;
            tracing::debug!(
                path = %layout.config_path().display(),
                "Loaded manager configuration"
            );
            return Ok(config);
        }

        // Validate fully before anything is written
        let config = ManagerConfig::from_bootstrap(
            layout.root().to_path_buf(),
            &options.bootstrap,
            resolver,
        )
        .await?;
        store.save(&config)?;

        tracing::info!(
            path = %layout.config_path().display(),
            user = %config.user,
            group = %config.group,
            volume_config = %config.volume_config,
            "Persisted new manager configuration"
        );
        Ok(config)
    }

    /// Remount every volume whose record says it is mounted.
    ///
    /// Runs once during [`initialize`](Self::initialize). Each mounted volume
    /// is remounted exactly once at its recorded path; the first failure
    /// aborts startup.
    async fn recover(&self) -> QuovolResult<()> {
        let names = self.inner.registry.list_volume_names()?;
        let mut remounted = 0usize;

        for name in &names {
            let _guard = self.inner.locks.lock(name).await;
            let mut record = self.load_record(name)?;

            let Some(recorded) = record.mount.mount_point().map(Path::to_path_buf) else {
                continue;
            };

            tracing::debug!(
                volume = %name,
                mount_point = %recorded.display(),
                "Remounting volume"
            );

            let mounted = self.run_mount(&record, recorded.clone()).await?;
            if mounted != recorded {
                record.set_mounted(mounted);
                self.inner.store.save(&record)?;
            }
            remounted += 1;
        }

        tracing::info!(
            volumes = names.len(),
            remounted,
            "Recovery complete"
        );
        Ok(())
    }
}

// ============================================================================
// VOLUME OPERATIONS
// ============================================================================

impl VolumeManager {
    /// Provision a new volume remotely and record it.
    ///
    /// No record is written unless the remote side succeeded.
    pub async fn create_volume(&self, name: &str) -> QuovolResult<VolumeInfo> {
        validate_volume_name(name)?;
        let _guard = self.inner.locks.lock(name).await;

        if self.inner.store.exists::<VolumeRecord>(name)? {
            return Err(QuovolError::AlreadyExists(name.to_string()));
        }

        let config = &self.inner.config;
        let request = CreateVolumeRequest {
            name: name.to_string(),
            root_user: config.user.clone(),
            root_group: config.group.clone(),
            configuration: config.volume_config.clone(),
        };

        let remote_id = with_timeout(
            self.remote_timeout(),
            self.inner.remote.create_volume(&request),
            |reason| QuovolError::RemoteProvisioning {
                name: name.to_string(),
                reason,
            },
        )
        .await?;

        let record = VolumeRecord::new(
            name,
            remote_id,
            &config.user,
            &config.group,
            &config.volume_config,
        );
        self.inner.store.save(&record)?;

        tracing::info!(
            volume = %name,
            remote_id = %record.remote_id,
            "Created volume"
        );
        Ok(VolumeInfo::from(&record))
    }

    /// Remove a volume.
    ///
    /// Unless `reference_only`, the remote volume is deprovisioned first and
    /// the record is kept if that fails.
    pub async fn delete_volume(&self, name: &str, reference_only: bool) -> QuovolResult<()> {
        validate_volume_name(name)?;
        let _guard = self.inner.locks.lock(name).await;

        let record = self.load_record(name)?;
        if !record.mount.can_delete() {
            return Err(QuovolError::StillMounted {
                name: name.to_string(),
                mount_point: record
                    .mount
                    .mount_point()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            });
        }

        if reference_only {
            tracing::debug!(volume = %name, "Reference-only delete, leaving remote volume");
        } else {
            with_timeout(
                self.remote_timeout(),
                self.inner.remote.delete_volume(name, &record.remote_id),
                |reason| QuovolError::RemoteDeprovisioning {
                    name: name.to_string(),
                    reason,
                },
            )
            .await?;
        }

        self.inner.store.delete::<VolumeRecord>(name)?;

        tracing::info!(
            volume = %name,
            remote_id = %record.remote_id,
            reference_only,
            "Deleted volume"
        );
        Ok(())
    }

    /// Mount a volume and return its mount point.
    ///
    /// Without a hint the volume goes to `<root>/mounts/<name>`. An already
    /// mounted volume is returned as-is unless the hint names a different
    /// path, which fails with `AlreadyMounted`. Hints must be absolute.
    pub async fn mount_volume(&self, name: &str, hint: Option<&Path>) -> QuovolResult<PathBuf> {
        validate_volume_name(name)?;
        if let Some(hint) = hint
            && !hint.is_absolute()
        {
            return Err(QuovolError::InvalidArgument(format!(
                "mount point must be an absolute path: {}",
                hint.display()
            )));
        }
        let _guard = self.inner.locks.lock(name).await;

        let mut record = self.load_record(name)?;

        match record.mount.plan_mount(hint) {
            MountPlan::AlreadyAt(path) => {
                tracing::debug!(
                    volume = %name,
                    mount_point = %path.display(),
                    "Volume already mounted"
                );
                Ok(path)
            }
            MountPlan::Conflict(current) => Err(QuovolError::AlreadyMounted {
                name: name.to_string(),
                mount_point: current.display().to_string(),
                requested: hint
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            }),
            MountPlan::Mount => {
                let target = hint
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.inner.layout.default_mount_point(name));

                let mounted = self.run_mount(&record, target).await?;
                record.set_mounted(mounted.clone());
                if let Err(e) = self.inner.store.save(&record) {
                    self.rollback_mount(name, &mounted).await;
                    return Err(e);
                }

                tracing::info!(
                    volume = %name,
                    mount_point = %mounted.display(),
                    "Mounted volume"
                );
                Ok(mounted)
            }
        }
    }

    /// Unmount a volume. Unmounting an unmounted volume is a no-op.
    pub async fn unmount_volume(&self, name: &str) -> QuovolResult<()> {
        validate_volume_name(name)?;
        let _guard = self.inner.locks.lock(name).await;

        let mut record = self.load_record(name)?;
        let Some(mount_point) = record.mount.mount_point().map(Path::to_path_buf) else {
            tracing::warn!(volume = %name, "Unmount requested for a volume that is not mounted");
            return Ok(());
        };

        let request = UnmountRequest {
            name: name.to_string(),
            remove_target: mount_point == self.inner.layout.default_mount_point(name),
            target: mount_point.clone(),
        };

        with_timeout(
            self.mount_timeout(),
            self.inner.mounter.unmount(&request),
            |reason| QuovolError::Unmount {
                name: name.to_string(),
                reason,
            },
        )
        .await?;

        record.set_unmounted();
        self.inner.store.save(&record)?;

        tracing::info!(
            volume = %name,
            mount_point = %mount_point.display(),
            "Unmounted volume"
        );
        Ok(())
    }

    pub fn get_volume_info(&self, name: &str) -> QuovolResult<VolumeInfo> {
        validate_volume_name(name)?;
        self.load_record(name).map(|record| VolumeInfo::from(&record))
    }

    /// Info for every known volume, sorted by name.
    ///
    /// Fails as a whole if any single record cannot be read.
    pub fn list_volumes(&self) -> QuovolResult<Vec<VolumeInfo>> {
        self.inner
            .registry
            .list_volume_names()?
            .iter()
            .map(|name| self.load_record(name).map(|record| VolumeInfo::from(&record)))
            .collect()
    }

    /// Current mount point, `None` when unmounted.
    pub fn mount_point(&self, name: &str) -> QuovolResult<Option<PathBuf>> {
        validate_volume_name(name)?;
        let record = self.load_record(name)?;
        Ok(record.mount.mount_point().map(Path::to_path_buf))
    }

    // ------------------------------------------------------------------------
    // Snapshots and backups are not supported by this driver
    // ------------------------------------------------------------------------

    pub async fn create_snapshot(&self, volume: &str, _snapshot: &str) -> QuovolResult<()> {
        Err(unsupported("snapshots", volume))
    }

    pub async fn delete_snapshot(&self, volume: &str, _snapshot: &str) -> QuovolResult<()> {
        Err(unsupported("snapshots", volume))
    }

    pub async fn create_backup(&self, volume: &str, _target: &str) -> QuovolResult<()> {
        Err(unsupported("backups", volume))
    }

    pub async fn delete_backup(&self, volume: &str, _backup: &str) -> QuovolResult<()> {
        Err(unsupported("backups", volume))
    }
}

// ============================================================================
// ACCESSORS
// ============================================================================

impl VolumeManager {
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.inner.layout
    }

    /// Driver-level description for the host.
    pub fn info(&self) -> BTreeMap<String, String> {
        let config = &self.inner.config;
        BTreeMap::from([
            (
                info_keys::ROOT.to_string(),
                self.inner.layout.root().display().to_string(),
            ),
            (info_keys::REGISTRIES.to_string(), config.registries.clone()),
            (info_keys::USER.to_string(), config.user.clone()),
            (info_keys::GROUP.to_string(), config.group.clone()),
            (
                info_keys::VOLUME_CONFIG.to_string(),
                config.volume_config.clone(),
            ),
        ])
    }

    fn remote_timeout(&self) -> Duration {
        self.inner.config.remote_timeout()
    }

    fn mount_timeout(&self) -> Duration {
        self.inner.config.mount_timeout()
    }

    fn load_record(&self, name: &str) -> QuovolResult<VolumeRecord> {
        self.inner.store.load::<VolumeRecord>(name)
    }

    /// Best-effort unmount of a mount whose record could not be saved.
    async fn rollback_mount(&self, name: &str, mounted: &Path) {
        let request = UnmountRequest {
            name: name.to_string(),
            target: mounted.to_path_buf(),
            remove_target: mounted == self.inner.layout.default_mount_point(name),
        };
        let result = with_timeout(
            self.mount_timeout(),
            self.inner.mounter.unmount(&request),
            |reason| QuovolError::Unmount {
                name: name.to_string(),
                reason,
            },
        )
        .await;

        match result {
            Ok(()) => tracing::warn!(
                volume = %name,
                mount_point = %mounted.display(),
                "Record save failed, rolled back mount"
            ),
            Err(e) => tracing::warn!(
                volume = %name,
                mount_point = %mounted.display(),
                "Record save failed and mount is left in place: {}",
                e
            ),
        }
    }

    async fn run_mount(&self, record: &VolumeRecord, target: PathBuf) -> QuovolResult<PathBuf> {
        let request = MountRequest {
            name: record.name.clone(),
            device: record.device.clone(),
            fs_type: driver::FS_TYPE.to_string(),
            target,
        };

        with_timeout(
            self.mount_timeout(),
            self.inner.mounter.mount(&request),
            |reason| QuovolError::Mount {
                name: record.name.clone(),
                reason,
            },
        )
        .await
    }
}

fn unsupported(what: &str, volume: &str) -> QuovolError {
    QuovolError::Unsupported(format!(
        "{what} are not supported by the {} driver (volume {volume})",
        driver::NAME
    ))
}

// ============================================================================
// THREAD SAFETY ASSERTIONS
// ============================================================================

// Compile-time assertion that VolumeManager is Send + Sync
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<VolumeManager>;
};
