//! Volume records and their mount state machine.
//!
//! - **VolumeRecord**: durable per-volume state, one JSON file per volume
//! - **MountState**: `Unmounted` or `Mounted { path }`
//! - **VolumeInfo**: read-only projection returned by inspect/list

mod info;
mod record;
mod state;

pub use info::VolumeInfo;
pub use record::{VolumeRecord, validate_volume_name};
pub use state::{MountPlan, MountState};
