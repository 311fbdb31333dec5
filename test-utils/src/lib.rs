//! Test doubles for the quovol crates.
//!
//! - [`FakeRemote`]: in-memory remote cluster that records every call
//! - [`FakeMounter`]: mount executor that records every call, mounts nothing
//! - [`FakeResolver`]: resolves a fixed set of registry hostnames
//! - [`TestContext`]: temporary storage root wired to the fakes

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use quovol::{
    ApiSettings, BootstrapOptions, CreateVolumeRequest, HostResolver, ManagerOptions,
    MountRequest, Mounter, RemoteConnector, RemoteVolumes, UnmountRequest, VolumeManager,
};
use quovol_shared::errors::{QuovolError, QuovolResult};
use tempfile::TempDir;

/// Registry list used by [`TestContext`].
pub const TEST_REGISTRIES: &str = "quobyte-1:7861";
pub const TEST_API_URL: &str = "http://quobyte-api:7860";

/// How a fake responds to the next calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Behavior {
    #[default]
    Succeed,
    /// Fail with the given reason.
    Fail(String),
    /// Never complete.
    Hang,
    /// Sleep, then succeed.
    Delay(Duration),
}

impl Behavior {
    async fn apply(&self) -> Result<(), String> {
        match self {
            Behavior::Succeed => Ok(()),
            Behavior::Fail(reason) => Err(reason.clone()),
            Behavior::Hang => std::future::pending().await,
            Behavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
        }
    }
}

// ============================================================================
// REMOTE CLUSTER
// ============================================================================

#[derive(Debug, Default)]
struct RemoteState {
    created: Vec<CreateVolumeRequest>,
    deleted: Vec<(String, String)>,
    connected_with: Vec<ApiSettings>,
    fixed_id: Option<String>,
    on_create: Behavior,
    on_delete: Behavior,
}

/// In-memory remote cluster.
///
/// Assigns ids `remote-1`, `remote-2`, ... unless a fixed id is set.
#[derive(Debug, Default)]
pub struct FakeRemote {
    state: Mutex<RemoteState>,
    next_id: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Return `id` from every subsequent create.
    pub fn set_fixed_id(&self, id: impl Into<String>) {
        self.state.lock().fixed_id = Some(id.into());
    }

    pub fn on_create(&self, behavior: Behavior) {
        self.state.lock().on_create = behavior;
    }

    pub fn on_delete(&self, behavior: Behavior) {
        self.state.lock().on_delete = behavior;
    }

    /// Every create request received, in order.
    pub fn created(&self) -> Vec<CreateVolumeRequest> {
        self.state.lock().created.clone()
    }

    /// Every `(name, remote_id)` delete received, in order.
    pub fn deleted(&self) -> Vec<(String, String)> {
        self.state.lock().deleted.clone()
    }

    /// API settings handed to the connector, one entry per manager start.
    pub fn connections(&self) -> Vec<ApiSettings> {
        self.state.lock().connected_with.clone()
    }

    /// Connector that hands out this fake.
    pub fn connector(self: &Arc<Self>) -> impl RemoteConnector + use<> {
        let remote = Arc::clone(self);
        move |api: &ApiSettings| -> QuovolResult<Arc<dyn RemoteVolumes>> {
            remote.state.lock().connected_with.push(api.clone());
            Ok(Arc::clone(&remote) as Arc<dyn RemoteVolumes>)
        }
    }
}

#[async_trait]
impl RemoteVolumes for FakeRemote {
    async fn create_volume(&self, request: &CreateVolumeRequest) -> QuovolResult<String> {
        let behavior = {
            let mut state = self.state.lock();
            state.created.push(request.clone());
            state.on_create.clone()
        };

        behavior
            .apply()
            .await
            .map_err(|reason| QuovolError::RemoteProvisioning {
                name: request.name.clone(),
                reason,
            })?;

        let fixed = self.state.lock().fixed_id.clone();
        Ok(fixed.unwrap_or_else(|| {
            format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        }))
    }

    async fn delete_volume(&self, name: &str, remote_id: &str) -> QuovolResult<()> {
        let behavior = {
            let mut state = self.state.lock();
            state
                .deleted
                .push((name.to_string(), remote_id.to_string()));
            state.on_delete.clone()
        };

        behavior
            .apply()
            .await
            .map_err(|reason| QuovolError::RemoteDeprovisioning {
                name: name.to_string(),
                reason,
            })
    }
}

// ============================================================================
// MOUNT EXECUTOR
// ============================================================================

#[derive(Debug, Default)]
struct MounterState {
    mounts: Vec<MountRequest>,
    unmounts: Vec<UnmountRequest>,
    on_mount: Behavior,
    on_unmount: Behavior,
    /// Report this path instead of the requested target.
    mount_at: Option<PathBuf>,
    /// Turn this path into a non-empty directory after each mount.
    occupy_on_mount: Option<PathBuf>,
}

/// Mount executor that performs no OS mounts.
#[derive(Debug, Default)]
pub struct FakeMounter {
    state: Mutex<MounterState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeMounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_mount(&self, behavior: Behavior) {
        self.state.lock().on_mount = behavior;
    }

    pub fn on_unmount(&self, behavior: Behavior) {
        self.state.lock().on_unmount = behavior;
    }

    /// Make every mount report `path` as the effective mount point.
    pub fn mount_at(&self, path: impl Into<PathBuf>) {
        self.state.lock().mount_at = Some(path.into());
    }

    /// After each successful mount, replace `path` with a non-empty
    /// directory so nothing can be renamed onto it.
    pub fn occupy_on_mount(&self, path: impl Into<PathBuf>) {
        self.state.lock().occupy_on_mount = Some(path.into());
    }

    pub fn mounts(&self) -> Vec<MountRequest> {
        self.state.lock().mounts.clone()
    }

    pub fn unmounts(&self) -> Vec<UnmountRequest> {
        self.state.lock().unmounts.clone()
    }

    /// Mount requests received for `name`.
    pub fn mounts_of(&self, name: &str) -> Vec<MountRequest> {
        self.mounts()
            .into_iter()
            .filter(|m| m.name == name)
            .collect()
    }

    /// Highest number of mount/unmount calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn track<T>(&self, fut: impl std::future::Future<Output = T>) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let out = fut.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl Mounter for FakeMounter {
    async fn mount(&self, request: &MountRequest) -> QuovolResult<PathBuf> {
        let (behavior, mount_at, occupy_path) = {
            let mut state = self.state.lock();
            state.mounts.push(request.clone());
            (
                state.on_mount.clone(),
                state.mount_at.clone(),
                state.occupy_on_mount.clone(),
            )
        };

        self.track(behavior.apply())
            .await
            .map_err(|reason| QuovolError::Mount {
                name: request.name.clone(),
                reason,
            })?;

        if let Some(path) = occupy_path {
            occupy(&path)?;
        }

        Ok(mount_at.unwrap_or_else(|| request.target.clone()))
    }

    async fn unmount(&self, request: &UnmountRequest) -> QuovolResult<()> {
        let behavior = {
            let mut state = self.state.lock();
            state.unmounts.push(request.clone());
            state.on_unmount.clone()
        };

        self.track(behavior.apply())
            .await
            .map_err(|reason| QuovolError::Unmount {
                name: request.name.clone(),
                reason,
            })
    }
}

fn occupy(path: &Path) -> QuovolResult<()> {
    let io =
        |e: std::io::Error| QuovolError::Internal(format!("occupy {}: {}", path.display(), e));
    if path.is_file() {
        std::fs::remove_file(path).map_err(io)?;
    }
    std::fs::create_dir_all(path).map_err(io)?;
    std::fs::write(path.join("occupied"), b"x").map_err(io)
}

// ============================================================================
// HOST RESOLVER
// ============================================================================

/// Resolves only the hostnames it was given.
#[derive(Debug, Clone, Default)]
pub struct FakeResolver {
    known: HashSet<String>,
}

impl FakeResolver {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: hosts.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl HostResolver for FakeResolver {
    async fn resolves(&self, host: &str, _port: u16) -> bool {
        self.known.contains(host)
    }
}

// ============================================================================
// TEST CONTEXT
// ============================================================================

/// Isolated storage root plus fakes, shared across manager restarts.
pub struct TestContext {
    pub remote: Arc<FakeRemote>,
    pub mounter: Arc<FakeMounter>,
    pub resolver: FakeResolver,
    pub bootstrap: BootstrapOptions,
    temp_dir: TempDir, // Dropped after test
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self {
            remote: FakeRemote::new(),
            mounter: FakeMounter::new(),
            resolver: FakeResolver::new(["quobyte-1", "quobyte-2", "quobyte-3"]),
            bootstrap: BootstrapOptions::new()
                .with("quobyte.apiurl", TEST_API_URL)
                .with("quobyte.registries", TEST_REGISTRIES),
            temp_dir,
        }
    }

    /// Context whose bootstrap map also carries `key = value`.
    pub fn with_bootstrap(mut self, key: &str, value: &str) -> Self {
        self.bootstrap = self.bootstrap.with(key, value);
        self
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn options(&self) -> ManagerOptions {
        ManagerOptions {
            root_dir: self.root().to_path_buf(),
            bootstrap: self.bootstrap.clone(),
        }
    }

    /// Start (or restart) a manager on this context's root.
    pub async fn start(&self) -> QuovolResult<VolumeManager> {
        VolumeManager::initialize(
            self.options(),
            &self.remote.connector(),
            self.mounter.clone(),
            &self.resolver,
        )
        .await
    }

    /// [`start`](Self::start), panicking on failure.
    pub async fn manager(&self) -> VolumeManager {
        self.start().await.expect("Failed to start volume manager")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
