//! File-backed store for persistent ledgers.
//!
//! Layout of a store directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-process access
//! └─ passes.cbor       # Snapshot of every record
//! ```

use crate::error::{StoreError, StoreResult};
use crate::filter::PassFilter;
use crate::store::LocalStore;
use crate::table::{PassTable, Snapshot};
use crate::types::{NewPass, PassId, PassPatch, SubscriptionPass};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";
const SNAPSHOT_FILE: &str = "passes.cbor";
/// Temporary file for atomic snapshot writes.
const SNAPSHOT_TEMP: &str = "passes.cbor.tmp";

/// A directory-backed store.
///
/// Every mutation rewrites the snapshot through a temporary file and an
/// atomic rename before the in-memory table is replaced, so a failed write
/// leaves both the file and the table as they were.
///
/// # Thread Safety
///
/// The store holds an exclusive advisory lock on its directory; a second
/// `FileStore` on the same directory fails with [`StoreError::Locked`].
///
/// # Example
///
/// ```no_run
/// use tollpass_store::{FileStore, LocalStore, NewPass, VehicleClass};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("ledger")).unwrap();
/// store.create(NewPass::local("GA-1", "Ada", VehicleClass::Car, 500)).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: RwLock<PassTable>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - Another process holds the lock (returns `Locked`)
    /// - The snapshot exists but cannot be decoded
    pub fn open(path: &Path) -> StoreResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.to_path_buf()));
        }

        let table = Self::load(&path.join(SNAPSHOT_FILE))?;
        debug!(path = %path.display(), records = table.len(), "opened pass store");

        Ok(Self {
            path: path.to_path_buf(),
            table: RwLock::new(table),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(snapshot_path: &Path) -> StoreResult<PassTable> {
        if !snapshot_path.exists() {
            return Ok(PassTable::new());
        }

        let reader = BufReader::new(File::open(snapshot_path)?);
        let snapshot: Snapshot =
            ciborium::from_reader(reader).map_err(|e| StoreError::Codec(e.to_string()))?;
        PassTable::from_snapshot(snapshot)
    }

    fn persist(&self, table: &PassTable) -> StoreResult<()> {
        let temp_path = self.path.join(SNAPSHOT_TEMP);
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            ciborium::into_writer(&table.to_snapshot(), &mut writer)
                .map_err(|e| StoreError::Codec(e.to_string()))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp_path, self.path.join(SNAPSHOT_FILE))?;
        Ok(())
    }

    /// Applies `change` to a copy of the table, persists it, then swaps it in.
    fn mutate<F>(&self, change: F) -> StoreResult<SubscriptionPass>
    where
        F: FnOnce(&mut PassTable) -> StoreResult<SubscriptionPass>,
    {
        let mut table = self.table.write();
        let mut next = table.clone();
        let pass = change(&mut next)?;
        self.persist(&next)?;
        *table = next;
        Ok(pass)
    }
}

impl LocalStore for FileStore {
    fn find_by_plate(&self, plate: &str) -> StoreResult<Option<SubscriptionPass>> {
        Ok(self.table.read().find_by_plate(plate).cloned())
    }

    fn get(&self, id: PassId) -> StoreResult<Option<SubscriptionPass>> {
        Ok(self.table.read().get(id).cloned())
    }

    fn create(&self, pass: NewPass) -> StoreResult<SubscriptionPass> {
        self.mutate(|table| table.insert(pass))
    }

    fn update(&self, id: PassId, patch: &PassPatch) -> StoreResult<SubscriptionPass> {
        if patch.is_empty() {
            return self
                .table
                .read()
                .get(id)
                .cloned()
                .ok_or(StoreError::NotFound { id });
        }
        self.mutate(|table| table.apply(id, patch))
    }

    fn list(&self, filter: &PassFilter) -> StoreResult<Vec<SubscriptionPass>> {
        Ok(self.table.read().list(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Origin, RemoteRef, VehicleClass};
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger");

        let store = FileStore::open(&path).unwrap();
        assert!(store.list(&PassFilter::all()).unwrap().is_empty());
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(store.path(), path);
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let synced_at = Utc::now();

        let created = {
            let store = FileStore::open(dir.path()).unwrap();
            let pass = store
                .create(NewPass::local("GA-1", "Ada", VehicleClass::Truck, 1_000))
                .unwrap();
            store
                .update(
                    pass.id,
                    &PassPatch::new()
                        .balance(500)
                        .remote_ref(RemoteRef::new(77))
                        .last_sync_at(synced_at)
                        .origin(Origin::Local),
                )
                .unwrap()
        };

        let store = FileStore::open(dir.path()).unwrap();
        let loaded = store.find_by_plate("GA-1").unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.balance, 500);
        assert_eq!(loaded.last_sync_at, Some(synced_at));

        // Ids keep counting after a reopen.
        let next = store
            .create(NewPass::local("GA-2", "Bob", VehicleClass::Car, 0))
            .unwrap();
        assert_eq!(next.id, PassId::new(2));
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _store = FileStore::open(dir.path()).unwrap();

        let err = FileStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));
    }

    #[test]
    fn file_rejected_mutation_is_not_persisted() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            let pass = store
                .create(NewPass::local("GA-1", "Ada", VehicleClass::Car, 1_000))
                .unwrap();
            assert!(store.update(pass.id, &PassPatch::new().balance(-1)).is_err());
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.find_by_plate("GA-1").unwrap().unwrap().balance, 1_000);
    }

    #[test]
    fn file_failed_write_leaves_table_unchanged() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let pass = store
            .create(NewPass::local("GA-1", "Ada", VehicleClass::Car, 1_000))
            .unwrap();

        // A directory in the temp file's place makes every snapshot write fail.
        fs::create_dir(dir.path().join(SNAPSHOT_TEMP)).unwrap();
        let err = store
            .update(pass.id, &PassPatch::new().balance(500))
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(store
            .create(NewPass::local("GA-2", "Bob", VehicleClass::Car, 0))
            .is_err());

        assert_eq!(store.get(pass.id).unwrap(), Some(pass.clone()));
        assert!(store.find_by_plate("GA-2").unwrap().is_none());

        fs::remove_dir(dir.path().join(SNAPSHOT_TEMP)).unwrap();
        let updated = store
            .update(pass.id, &PassPatch::new().balance(500))
            .unwrap();
        assert_eq!(updated.balance, 500);
        drop(store);

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get(pass.id).unwrap().unwrap().balance, 500);
        assert_eq!(store.list(&PassFilter::all()).unwrap().len(), 1);
    }

    #[test]
    fn file_garbage_snapshot_is_codec_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SNAPSHOT_FILE), b"not cbor at all").unwrap();

        let err = FileStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Codec(_) | StoreError::Corrupted(_)));
    }
}
