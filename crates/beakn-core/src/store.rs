//! Persistent storage for region tables.
//!
//! The tracker keeps three named tables (identifier → descriptor). A
//! [`TableStore`] loads a table by name and saves it back after every
//! mutation. Two implementations are provided:
//!
//! - [`JsonFileStore`] - one JSON file per table under `<data_dir>/regions/`
//! - [`MemoryStore`] - in-process tables, with fault injection for tests

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::descriptor::BeaconDescriptor;
use crate::error::{BeaknError, Result};

/// A mapping from identifier to descriptor.
pub type RegionTable = BTreeMap<String, BeaconDescriptor>;

/// Name of the table holding every requested descriptor.
pub const REQUESTED_TABLE: &str = "requested";

/// Name of the table holding platform-confirmed descriptors.
pub const MONITORED_TABLE: &str = "monitored";

/// Name of the table holding descriptors the device is currently inside.
pub const REACHABLE_TABLE: &str = "reachable";

/// Key-value persistence for named region tables.
pub trait TableStore: Send + Sync {
    /// Load a table. A table that was never saved loads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be read or decoded.
    fn load(&self, name: &str) -> Result<RegionTable>;

    /// Save a table, replacing any previous contents. Empty tables are saved
    /// too, so removing the last entry is durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be written.
    fn save(&self, name: &str, table: &RegionTable) -> Result<()>;
}

/// File-backed table store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Create a store at the default data location.
    ///
    /// On Linux: `/var/lib/beakn/`
    /// Elsewhere: the platform data directory for `beakn`
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory can be determined.
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(default_data_dir()?))
    }

    /// Root directory of this store.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.data_dir.join("regions").join(format!("{name}.json"))
    }
}

impl TableStore for JsonFileStore {
    fn load(&self, name: &str) -> Result<RegionTable> {
        let path = self.table_path(name);
        if !path.exists() {
            return Ok(RegionTable::new());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            BeaknError::Persistence(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            BeaknError::Persistence(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    fn save(&self, name: &str, table: &RegionTable) -> Result<()> {
        let path = self.table_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BeaknError::Persistence(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let content = serde_json::to_string_pretty(table)?;

        // Write then rename so a crash never leaves a half-written table.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| {
            BeaknError::Persistence(format!("Failed to write {}: {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            BeaknError::Persistence(format!("Failed to replace {}: {e}", path.display()))
        })?;

        tracing::trace!(table = name, entries = table.len(), "Saved region table");
        Ok(())
    }
}

/// In-memory table store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, RegionTable>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Copy of a stored table, bypassing the trait.
    #[must_use]
    pub fn table(&self, name: &str) -> RegionTable {
        self.tables.lock().get(name).cloned().unwrap_or_default()
    }
}

impl TableStore for MemoryStore {
    fn load(&self, name: &str) -> Result<RegionTable> {
        Ok(self.table(name))
    }

    fn save(&self, name: &str, table: &RegionTable) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(BeaknError::Persistence(format!(
                "Refusing to save table '{name}'"
            )));
        }
        self.tables.lock().insert(name.to_string(), table.clone());
        Ok(())
    }
}

impl<T: TableStore + ?Sized> TableStore for std::sync::Arc<T> {
    fn load(&self, name: &str) -> Result<RegionTable> {
        (**self).load(name)
    }

    fn save(&self, name: &str, table: &RegionTable) -> Result<()> {
        (**self).save(name, table)
    }
}

/// Default directory for beakn data.
///
/// # Errors
///
/// Returns an error on non-Linux platforms without a resolvable home directory.
pub fn default_data_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/var/lib/beakn"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let dirs = directories::ProjectDirs::from("", "", "beakn").ok_or_else(|| {
            BeaknError::Persistence("Cannot determine data directory".into())
        })?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "E2C56DB5-DFFB-48D2-B060-D0F5A71096E0";

    fn sample_table() -> RegionTable {
        let mut table = RegionTable::new();
        for d in [
            BeaconDescriptor::new(UUID, "any", None, None),
            BeaconDescriptor::new(UUID, "major", Some(4), None),
            BeaconDescriptor::new(UUID, "both", Some(4), Some(65535)),
        ] {
            table.insert(d.identifier.clone(), d);
        }
        table
    }

    fn assert_same_fields(a: &RegionTable, b: &RegionTable) {
        assert_eq!(a.len(), b.len());
        for (key, left) in a {
            let right = &b[key];
            assert_eq!(left.uuid, right.uuid);
            assert_eq!(left.identifier, right.identifier);
            assert_eq!(left.major, right.major);
            assert_eq!(left.minor, right.minor);
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let table = sample_table();
        store.save(REQUESTED_TABLE, &table).unwrap();

        let loaded = store.load(REQUESTED_TABLE).unwrap();
        assert_same_fields(&table, &loaded);
        assert!(dir.path().join("regions/requested.json").exists());
        assert!(!dir.path().join("regions/requested.json.tmp").exists());
    }

    #[test]
    fn test_file_store_missing_table_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load(MONITORED_TABLE).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_saves_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.save(REACHABLE_TABLE, &sample_table()).unwrap();
        store.save(REACHABLE_TABLE, &RegionTable::new()).unwrap();

        assert!(store.load(REACHABLE_TABLE).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_corrupt_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("regions")).unwrap();
        std::fs::write(dir.path().join("regions/requested.json"), "{ not json").unwrap();

        let err = store.load(REQUESTED_TABLE).unwrap_err();
        assert!(matches!(err, BeaknError::Persistence(msg) if msg.contains("requested.json")));
    }

    #[test]
    fn test_memory_store_round_trip_and_fault_injection() {
        let store = MemoryStore::new();
        let table = sample_table();

        store.save(MONITORED_TABLE, &table).unwrap();
        assert_same_fields(&table, &store.load(MONITORED_TABLE).unwrap());

        store.fail_saves(true);
        assert!(store.save(MONITORED_TABLE, &RegionTable::new()).is_err());
        assert_eq!(store.table(MONITORED_TABLE).len(), 3);
    }
}
