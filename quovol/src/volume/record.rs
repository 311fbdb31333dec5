//! Persisted per-volume record.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use quovol_shared::constants::records;
use quovol_shared::errors::{QuovolError, QuovolResult};
use serde::{Deserialize, Serialize};

use super::state::MountState;
use crate::store::Record;

/// Durable state of one volume, keyed by name.
///
/// This is the single source of truth for a volume. The manager re-reads it
/// from the store before every operation and never caches it across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRecord {
    /// Unique name; also the record's key. Immutable.
    pub name: String,
    /// Identifier assigned by the remote cluster at provisioning time.
    pub remote_id: String,
    pub mount: MountState,
    pub user: String,
    pub group: String,
    /// Volume configuration template the remote volume was created with.
    pub volume_config: String,
    /// Source handed to the mount executor.
    pub device: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl VolumeRecord {
    /// Record for a freshly provisioned, unmounted volume.
    pub fn new(
        name: impl Into<String>,
        remote_id: impl Into<String>,
        user: impl Into<String>,
        group: impl Into<String>,
        volume_config: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            device: name.clone(),
            name,
            remote_id: remote_id.into(),
            mount: MountState::Unmounted,
            user: user.into(),
            group: group.into(),
            volume_config: volume_config.into(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_mounted()
    }

    pub fn set_mounted(&mut self, path: PathBuf) {
        self.mount = MountState::Mounted { path };
        self.last_updated = Utc::now();
    }

    pub fn set_unmounted(&mut self) {
        self.mount = MountState::Unmounted;
        self.last_updated = Utc::now();
    }
}

impl Record for VolumeRecord {
    const PREFIX: &'static str = records::VOLUME_PREFIX;
    const SUFFIX: &'static str = records::VOLUME_SUFFIX;

    fn id(&self) -> &str {
        &self.name
    }
}

/// Reject names that cannot safely become a file-name component.
pub fn validate_volume_name(name: &str) -> QuovolResult<()> {
    if name.is_empty() {
        return Err(QuovolError::InvalidArgument(
            "volume name must not be empty".into(),
        ));
    }
    if name == "." || name == ".." {
        return Err(QuovolError::InvalidArgument(format!(
            "invalid volume name: {name}"
        )));
    }
    if name.starts_with('-') {
        return Err(QuovolError::InvalidArgument(format!(
            "volume name must not start with '-': {name:?}"
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(QuovolError::InvalidArgument(format!(
            "volume name must not contain '/' or NUL: {name:?}"
        )));
    }
    Ok(())
}
