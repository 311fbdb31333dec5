//! Name-oriented view of the volume records in a [`RecordStore`].

use quovol_shared::errors::QuovolResult;

use super::{Record, RecordStore};
use crate::volume::VolumeRecord;

/// Enumerates the volumes known to the record store.
///
/// Holds no state of its own; every call rescans the storage root.
#[derive(Clone, Debug)]
pub struct VolumeRegistry {
    store: RecordStore,
}

impl VolumeRegistry {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Names of all persisted volumes, sorted.
    pub fn list_volume_names(&self) -> QuovolResult<Vec<String>> {
        self.store
            .list_ids(VolumeRecord::PREFIX, VolumeRecord::SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lists_only_volume_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::new(temp_dir.path().to_path_buf());

        store
            .save(&VolumeRecord::new("vol2", "id-2", "root", "nfsnobody", "BASE"))
            .unwrap();
        store
            .save(&VolumeRecord::new("vol1", "id-1", "root", "nfsnobody", "BASE"))
            .unwrap();
        std::fs::write(temp_dir.path().join("quobyte.cfg"), b"{}").unwrap();

        let registry = VolumeRegistry::new(store);
        assert_eq!(
            registry.list_volume_names().unwrap(),
            vec!["vol1".to_string(), "vol2".to_string()]
        );
    }

    #[test]
    fn test_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        let registry = VolumeRegistry::new(RecordStore::new(temp_dir.path().to_path_buf()));
        assert!(registry.list_volume_names().unwrap().is_empty());
    }
}
