//! Volume mount state and transitions.
//!
//! State machine:
//! ```text
//! create()  → Unmounted (record persisted, remote volume provisioned)
//! mount()   → Mounted { path }
//! unmount() → Unmounted
//! delete()  → record removed (only from Unmounted)
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Mount state of a volume, persisted inside its record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MountState {
    /// Record exists, nothing mounted.
    #[default]
    Unmounted,

    /// Mounted at `path`.
    Mounted { path: PathBuf },
}

impl MountState {
    pub fn is_mounted(&self) -> bool {
        matches!(self, MountState::Mounted { .. })
    }

    /// Mount point if mounted.
    pub fn mount_point(&self) -> Option<&Path> {
        match self {
            MountState::Mounted { path } => Some(path),
            MountState::Unmounted => None,
        }
    }

    /// Only unmounted volumes may be deleted.
    pub fn can_delete(&self) -> bool {
        matches!(self, MountState::Unmounted)
    }

    /// How a mount request at `requested` relates to this state.
    ///
    /// `None` means "no hint": the caller accepts wherever the volume is or
    /// will be mounted.
    pub fn plan_mount(&self, requested: Option<&Path>) -> MountPlan {
        match (self, requested) {
            (MountState::Unmounted, _) => MountPlan::Mount,
            (MountState::Mounted { path }, None) => MountPlan::AlreadyAt(path.clone()),
            (MountState::Mounted { path }, Some(req)) if req == path => {
                MountPlan::AlreadyAt(path.clone())
            }
            (MountState::Mounted { path }, Some(_)) => MountPlan::Conflict(path.clone()),
        }
    }
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountState::Unmounted => write!(f, "unmounted"),
            MountState::Mounted { path } => write!(f, "mounted at {}", path.display()),
        }
    }
}

/// Outcome of [`MountState::plan_mount`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountPlan {
    /// Not mounted yet: invoke the mount executor.
    Mount,
    /// Already mounted where the caller wants it.
    AlreadyAt(PathBuf),
    /// Mounted somewhere else.
    Conflict(PathBuf),
}
