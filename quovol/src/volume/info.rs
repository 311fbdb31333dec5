//! Read-only projection of a volume record.

use std::collections::BTreeMap;
use std::path::PathBuf;

use quovol_shared::constants::info_keys;
use serde::{Deserialize, Serialize};

use super::record::VolumeRecord;

/// Public metadata about a volume (for inspect/list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
    pub remote_id: String,
    pub mount_point: Option<PathBuf>,
    pub user: String,
    pub group: String,
    pub volume_config: String,
}

impl VolumeInfo {
    /// String map in the shape the host framework reports.
    ///
    /// An unmounted volume reports an empty `MountPoint`.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mount_point = self
            .mount_point
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        BTreeMap::from([
            (info_keys::MOUNT_POINT.to_string(), mount_point),
            (info_keys::ID.to_string(), self.remote_id.clone()),
            (info_keys::VOLUME_NAME.to_string(), self.name.clone()),
            (info_keys::USER.to_string(), self.user.clone()),
            (info_keys::GROUP.to_string(), self.group.clone()),
            (info_keys::CONFIG.to_string(), self.volume_config.clone()),
        ])
    }
}

impl From<&VolumeRecord> for VolumeInfo {
    fn from(record: &VolumeRecord) -> Self {
        Self {
            name: record.name.clone(),
            remote_id: record.remote_id.clone(),
            mount_point: record.mount.mount_point().map(|p| p.to_path_buf()),
            user: record.user.clone(),
            group: record.group.clone(),
            volume_config: record.volume_config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_of_unmounted_volume() {
        let record = VolumeRecord::new("vol1", "abc-123", "root", "nfsnobody", "BASE");
        let map = VolumeInfo::from(&record).to_map();

        assert_eq!(map["MountPoint"], "");
        assert_eq!(map["ID"], "abc-123");
        assert_eq!(map["VolumeName"], "vol1");
        assert_eq!(map["User"], "root");
        assert_eq!(map["Group"], "nfsnobody");
        assert_eq!(map["Config"], "BASE");
    }

    #[test]
    fn test_map_of_mounted_volume() {
        let mut record = VolumeRecord::new("vol1", "abc-123", "root", "nfsnobody", "BASE");
        record.set_mounted(PathBuf::from("/mnt/vol1"));

        let info = VolumeInfo::from(&record);
        assert_eq!(info.mount_point, Some(PathBuf::from("/mnt/vol1")));
        assert_eq!(info.to_map()["MountPoint"], "/mnt/vol1");
    }
}
