//! In-memory store for testing.

use crate::error::{StoreError, StoreResult};
use crate::filter::PassFilter;
use crate::store::LocalStore;
use crate::table::PassTable;
use crate::types::{NewPass, PassId, PassPatch, SubscriptionPass};
use parking_lot::RwLock;

/// An in-memory store.
///
/// Suitable for unit tests, integration tests and ledgers that do not need
/// to survive a restart.
///
/// # Thread Safety
///
/// The table sits behind a single lock, so every mutation is atomic.
///
/// # Example
///
/// ```rust
/// use tollpass_store::{InMemoryStore, LocalStore, NewPass, PassFilter, VehicleClass};
///
/// let store = InMemoryStore::new();
/// store.create(NewPass::local("GA-1", "Ada", VehicleClass::Car, 500)).unwrap();
/// assert_eq!(store.list(&PassFilter::all()).unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    table: RwLock<PassTable>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(PassTable::new()),
        }
    }

    /// Creates a store holding the given passes.
    ///
    /// # Errors
    ///
    /// Returns the first creation error, e.g. a duplicate plate.
    pub fn with_passes(passes: impl IntoIterator<Item = NewPass>) -> StoreResult<Self> {
        let mut table = PassTable::new();
        for pass in passes {
            table.insert(pass)?;
        }
        Ok(Self {
            table: RwLock::new(table),
        })
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for InMemoryStore {
    fn find_by_plate(&self, plate: &str) -> StoreResult<Option<SubscriptionPass>> {
        Ok(self.table.read().find_by_plate(plate).cloned())
    }

    fn get(&self, id: PassId) -> StoreResult<Option<SubscriptionPass>> {
        Ok(self.table.read().get(id).cloned())
    }

    fn create(&self, pass: NewPass) -> StoreResult<SubscriptionPass> {
        self.table.write().insert(pass)
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
        self.table.write().apply(id, patch)
    }

    fn list(&self, filter: &PassFilter) -> StoreResult<Vec<SubscriptionPass>> {
        Ok(self.table.read().list(filter))
    }
}
