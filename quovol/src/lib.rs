//! quovol - lifecycle manager for Quobyte-backed volumes
//!
//! Tracks each volume as a durable record in a storage root, provisions and
//! deprovisions volumes on the remote cluster, mounts and unmounts them on
//! this node, and remounts whatever was mounted when the process restarts.
//!
//! ```no_run
//! # async fn run(connector: &dyn quovol::RemoteConnector) -> quovol::QuovolResult<()> {
//! use quovol::{BootstrapOptions, ManagerOptions, VolumeManager};
//!
//! let options = ManagerOptions {
//!     root_dir: "/var/lib/quovol".into(),
//!     bootstrap: BootstrapOptions::new()
//!         .with("quobyte.apiurl", "http://quobyte-api:7860")
//!         .with("quobyte.registries", "quobyte-1:7861"),
//! };
//! let manager = VolumeManager::with_system(options, connector).await?;
//!
//! manager.create_volume("vol1").await?;
//! let mount_point = manager.mount_volume("vol1", None).await?;
//! println!("mounted at {}", mount_point.display());
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod mount;
pub mod remote;
pub mod runtime;
pub mod store;
pub mod util;
pub mod volume;

pub use driver::VolumeDriver;
pub use mount::{MountRequest, Mounter, SystemMounter, UnmountRequest};
pub use remote::{CreateVolumeRequest, RemoteConnector, RemoteVolumes};
pub use runtime::VolumeManager;
pub use runtime::options::{
    ApiSettings, BootstrapOptions, HostResolver, ManagerConfig, ManagerOptions, SystemResolver,
};
pub use runtime::types::VolumeRequest;
pub use volume::{MountState, VolumeInfo, VolumeRecord};

pub use quovol_shared::errors::{QuovolError, QuovolResult};
