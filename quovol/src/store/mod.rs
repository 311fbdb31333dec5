//! Persistent record store.
//!
//! Generic key-value store over JSON files in the storage root. Each record
//! type fixes a file-name prefix and suffix; the record's identity goes in
//! between (see [`record_key`]).
//!
//! Saves are crash-consistent: the new content is written to a temporary file
//! in the same directory, synced, then renamed over the old file. A reader
//! sees either the previous record or the new one, never a partial write.

mod registry;

pub use registry::VolumeRegistry;

use std::io::Write;
use std::path::{Path, PathBuf};

use quovol_shared::errors::{QuovolError, QuovolResult};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Build the file name for a record: `prefix + id + suffix`.
pub fn record_key(prefix: &str, id: &str, suffix: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + id.len() + suffix.len());
    key.push_str(prefix);
    key.push_str(id);
    key.push_str(suffix);
    key
}

/// Inverse of [`record_key`]: extract the id from a file name, if it matches.
pub fn parse_record_key<'a>(file_name: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    file_name.strip_prefix(prefix)?.strip_suffix(suffix)
}

/// A structured object persisted under a deterministic file name.
pub trait Record: Serialize + DeserializeOwned {
    const PREFIX: &'static str;
    const SUFFIX: &'static str;

    /// Identity of this record (empty for singletons).
    fn id(&self) -> &str;

    fn key_for(id: &str) -> String {
        record_key(Self::PREFIX, id, Self::SUFFIX)
    }
}

/// JSON-file record store rooted at a single directory.
#[derive(Clone, Debug)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for<R: Record>(&self, id: &str) -> PathBuf {
        self.root.join(R::key_for(id))
    }

    pub fn exists<R: Record>(&self, id: &str) -> QuovolResult<bool> {
        let path = self.path_for::<R>(id);
        path.try_exists().map_err(|e| {
            QuovolError::Storage(format!("failed to stat {}: {}", path.display(), e))
        })
    }

    /// Load a record.
    ///
    /// # Errors
    /// - `NotFound` if no record exists under `id`
    /// - `Storage` if the file cannot be read or does not parse
    pub fn load<R: Record>(&self, id: &str) -> QuovolResult<R> {
        let path = self.path_for::<R>(id);

        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QuovolError::NotFound(id.to_string()));
            }
            Err(e) => {
                return Err(QuovolError::Storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_slice(&contents).map_err(|e| {
            QuovolError::Storage(format!("corrupt record {}: {}", path.display(), e))
        })
    }

    /// Atomically replace (or create) a record.
    pub fn save<R: Record>(&self, record: &R) -> QuovolResult<()> {
        let path = self.path_for::<R>(record.id());

        let json = serde_json::to_vec_pretty(record).map_err(|e| {
            QuovolError::Storage(format!("failed to serialize {}: {}", path.display(), e))
        })?;

        let mut staged = tempfile::NamedTempFile::new_in(&self.root).map_err(|e| {
            QuovolError::Storage(format!(
                "failed to create temp file in {}: {}",
                self.root.display(),
                e
            ))
        })?;

        staged
            .write_all(&json)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| {
                QuovolError::Storage(format!(
                    "failed to write staged record for {}: {}",
                    path.display(),
                    e
                ))
            })?;

        staged.persist(&path).map_err(|e| {
            QuovolError::Storage(format!("failed to persist {}: {}", path.display(), e.error))
        })?;

        self.sync_root();
        tracing::trace!(path = %path.display(), "Saved record");
        Ok(())
    }

    /// Remove a record.
    ///
    /// # Errors
    /// - `NotFound` if no record exists under `id`
    pub fn delete<R: Record>(&self, id: &str) -> QuovolResult<()> {
        let path = self.path_for::<R>(id);

        match std::fs::remove_file(&path) {
            Ok(()) => {
                self.sync_root();
                tracing::trace!(path = %path.display(), "Deleted record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(QuovolError::NotFound(id.to_string()))
            }
            Err(e) => Err(QuovolError::Storage(format!(
                "failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Ids of all records whose file name matches `prefix`/`suffix`, sorted.
    pub fn list_ids(&self, prefix: &str, suffix: &str) -> QuovolResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            QuovolError::Storage(format!("failed to list {}: {}", self.root.display(), e))
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                QuovolError::Storage(format!("failed to list {}: {}", self.root.display(), e))
            })?;

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            if let Some(id) = parse_record_key(file_name, prefix, suffix)
                && !id.is_empty()
            {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Best-effort fsync of the root so renames and unlinks are durable.
    fn sync_root(&self) {
        #[cfg(unix)]
        {
            if let Err(e) = std::fs::File::open(&self.root).and_then(|dir| dir.sync_all()) {
                tracing::warn!(root = %self.root.display(), "Failed to sync storage root: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        name: String,
        size: u32,
    }

    impl Record for Widget {
        const PREFIX: &'static str = "test_widget_";
        const SUFFIX: &'static str = ".json";

        fn id(&self) -> &str {
            &self.name
        }
    }

    fn widget(name: &str, size: u32) -> Widget {
        Widget {
            name: name.to_string(),
            size,
        }
    }

    fn store() -> (RecordStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        (RecordStore::new(temp_dir.path().to_path_buf()), temp_dir)
    }

    #[test]
    fn test_record_key() {
        assert_eq!(
            record_key("quobyte_volume_", "vol1", ".json"),
            "quobyte_volume_vol1.json"
        );
        assert_eq!(record_key("quobyte", "", ".cfg"), "quobyte.cfg");
        assert_eq!(
            parse_record_key("quobyte_volume_vol1.json", "quobyte_volume_", ".json"),
            Some("vol1")
        );
        assert_eq!(
            parse_record_key("quobyte.cfg", "quobyte_volume_", ".json"),
            None
        );
    }

    #[test]
    fn test_save_then_load() {
        let (store, _dir) = store();
        let w = widget("a", 1);

        assert!(!store.exists::<Widget>("a").unwrap());
        store.save(&w).unwrap();
        assert!(store.exists::<Widget>("a").unwrap());
        assert_eq!(store.load::<Widget>("a").unwrap(), w);
    }

    #[test]
    fn test_save_replaces_previous_value() {
        let (store, _dir) = store();
        store.save(&widget("a", 1)).unwrap();
        store.save(&widget("a", 2)).unwrap();

        assert_eq!(store.load::<Widget>("a").unwrap().size, 2);
        // No staged temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_failed_save_keeps_previous_values() {
        let (store, _dir) = store();
        store.save(&widget("a", 1)).unwrap();

        // A non-empty directory at the target cannot be replaced by rename
        let blocked = store.root().join("test_widget_b.json");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), b"x").unwrap();

        let err = store.save(&widget("b", 2)).unwrap_err();
        assert!(matches!(err, QuovolError::Storage(msg) if msg.contains("failed to persist")));

        assert_eq!(store.load::<Widget>("a").unwrap(), widget("a", 1));
        assert!(blocked.join("keep").is_file());
        let leftovers: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let (store, _dir) = store();
        let err = store.load::<Widget>("missing").unwrap_err();
        assert_eq!(err, QuovolError::NotFound("missing".into()));
    }

    #[test]
    fn test_load_corrupt_is_storage_error() {
        let (store, _dir) = store();
        std::fs::write(store.root().join("test_widget_bad.json"), b"{ not json").unwrap();

        let err = store.load::<Widget>("bad").unwrap_err();
        assert!(matches!(err, QuovolError::Storage(msg) if msg.contains("corrupt record")));
    }

    #[test]
    fn test_delete() {
        let (store, _dir) = store();
        store.save(&widget("a", 1)).unwrap();

        store.delete::<Widget>("a").unwrap();
        assert!(!store.exists::<Widget>("a").unwrap());
        assert!(store.delete::<Widget>("a").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_ids_filters_by_prefix_and_suffix() {
        let (store, _dir) = store();
        store.save(&widget("b", 1)).unwrap();
        store.save(&widget("a", 1)).unwrap();
        std::fs::write(store.root().join("quobyte.cfg"), b"{}").unwrap();
        std::fs::write(store.root().join("test_widget_c.json.bak"), b"{}").unwrap();
        std::fs::write(store.root().join(".tmpXYZ"), b"{}").unwrap();
        std::fs::create_dir(store.root().join("mounts")).unwrap();

        let ids = store.list_ids(Widget::PREFIX, Widget::SUFFIX).unwrap();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn key_parses_back_to_id(id in "[A-Za-z0-9][A-Za-z0-9._-]{0,40}") {
                let key = record_key("quobyte_volume_", &id, ".json");
                prop_assert_eq!(parse_record_key(&key, "quobyte_volume_", ".json"), Some(id.as_str()));
            }

            #[test]
            fn foreign_prefix_never_matches(id in "[a-z0-9]{1,20}") {
                let key = record_key("other_", &id, ".json");
                prop_assert_eq!(parse_record_key(&key, "quobyte_volume_", ".json"), None);
            }
        }
    }
}
