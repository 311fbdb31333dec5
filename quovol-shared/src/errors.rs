//! Error types for the volume driver.
//!
//! Every operation returns [`QuovolResult`]. Variants that concern a single
//! volume carry its name; variants raised by an external capability (remote
//! cluster, mount executor) carry the underlying cause as a string so errors
//! stay `Clone` and can be shipped to the host framework.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the quovol crates.
pub type QuovolResult<T> = Result<T, QuovolError>;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuovolError {
    /// Missing or invalid bootstrap options. Fatal to initialization.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("volume {0} already exists")]
    AlreadyExists(String),

    #[error("volume {0} not found")]
    NotFound(String),

    /// Delete attempted while the volume is mounted.
    #[error("cannot delete volume {name}: still mounted at {mount_point}")]
    StillMounted { name: String, mount_point: String },

    /// Mount requested at a path other than the one the volume is mounted at.
    #[error("volume {name} is already mounted at {mount_point}, refusing to mount at {requested}")]
    AlreadyMounted {
        name: String,
        mount_point: String,
        requested: String,
    },

    #[error("failed to provision remote volume {name}: {reason}")]
    RemoteProvisioning { name: String, reason: String },

    #[error("failed to deprovision remote volume {name}: {reason}")]
    RemoteDeprovisioning { name: String, reason: String },

    #[error("failed to mount volume {name}: {reason}")]
    Mount { name: String, reason: String },

    #[error("failed to unmount volume {name}: {reason}")]
    Unmount { name: String, reason: String },

    /// Record store read/write/corruption failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl QuovolError {
    /// Volume name the error refers to, if any.
    pub fn volume(&self) -> Option<&str> {
        match self {
            QuovolError::AlreadyExists(name) | QuovolError::NotFound(name) => Some(name),
            QuovolError::StillMounted { name, .. }
            | QuovolError::AlreadyMounted { name, .. }
            | QuovolError::RemoteProvisioning { name, .. }
            | QuovolError::RemoteDeprovisioning { name, .. }
            | QuovolError::Mount { name, .. }
            | QuovolError::Unmount { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QuovolError::NotFound(_))
    }
}
