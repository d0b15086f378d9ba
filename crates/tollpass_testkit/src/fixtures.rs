//! Test fixtures and ledger helpers.
//!
//! Provides a fully wired ledger over an in-memory store and an in-memory
//! remote peer, plus a store wrapper that counts mutations.

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tollpass_remote::MemoryRemote;
use tollpass_store::{
    FileStore, InMemoryStore, LocalStore, NewPass, PassFilter, PassId, PassPatch, StoreResult,
    SubscriptionPass,
};
use tollpass_sync::{PassLedger, RemoteConfig, StaticConfig, SyncConfig, SyncEngine};

/// Database name the test peer accepts.
pub const TEST_DATABASE: &str = "tolls";
/// Login the test peer accepts.
pub const TEST_LOGIN: &str = "sync";
/// Password the test peer accepts.
pub const TEST_PASSWORD: &str = "secret";
/// Endpoint used in test configurations.
pub const TEST_ENDPOINT: &str = "https://peer.test";

/// Connection settings matching [`test_remote`].
pub fn test_remote_config() -> RemoteConfig {
    RemoteConfig::new(TEST_ENDPOINT, TEST_DATABASE, TEST_LOGIN, TEST_PASSWORD)
}

/// A remote peer accepting the test credentials.
pub fn test_remote() -> Arc<MemoryRemote> {
    Arc::new(MemoryRemote::new(TEST_DATABASE, TEST_LOGIN, TEST_PASSWORD))
}

/// Mutation counters of a [`CountingStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    /// Successful creates.
    pub creates: usize,
    /// Successful updates.
    pub updates: usize,
}

/// Wraps a store and counts successful mutations.
#[derive(Debug, Default)]
pub struct CountingStore<S> {
    inner: S,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl<S: LocalStore> CountingStore<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    /// Counters since creation or the last reset.
    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            creates: self.creates.load(Ordering::SeqCst),
            updates: self.updates.load(Ordering::SeqCst),
        }
    }

    /// Zeroes the counters.
    pub fn reset_counts(&self) {
        self.creates.store(0, Ordering::SeqCst);
        self.updates.store(0, Ordering::SeqCst);
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: LocalStore> LocalStore for CountingStore<S> {
    fn find_by_plate(&self, plate: &str) -> StoreResult<Option<SubscriptionPass>> {
        self.inner.find_by_plate(plate)
    }

    fn get(&self, id: PassId) -> StoreResult<Option<SubscriptionPass>> {
        self.inner.get(id)
    }

    fn create(&self, new: NewPass) -> StoreResult<SubscriptionPass> {
        let pass = self.inner.create(new)?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(pass)
    }

    fn update(&self, id: PassId, patch: &PassPatch) -> StoreResult<SubscriptionPass> {
        let pass = self.inner.update(id, patch)?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(pass)
    }

    fn list(&self, filter: &PassFilter) -> StoreResult<Vec<SubscriptionPass>> {
        self.inner.list(filter)
    }
}

/// Store type used by [`TestLedger`].
pub type TestStore = CountingStore<InMemoryStore>;

/// A ledger, its engine, store and remote peer, wired together.
pub struct TestLedger {
    /// The remote peer.
    pub remote: Arc<MemoryRemote>,
    /// The local store.
    pub store: Arc<TestStore>,
    /// The sync engine.
    pub engine: Arc<SyncEngine<TestStore, MemoryRemote>>,
    /// The ledger.
    pub ledger: PassLedger<TestStore, MemoryRemote>,
}

impl TestLedger {
    /// Creates a harness with the default engine configuration.
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    /// Creates a harness with `config`.
    pub fn with_config(config: SyncConfig) -> Self {
        Self::with_source(config, StaticConfig::new(test_remote_config()))
    }

    /// Creates a harness whose engine has no remote configuration.
    pub fn unconfigured() -> Self {
        Self::with_source(SyncConfig::default(), StaticConfig::unconfigured())
    }

    fn with_source(config: SyncConfig, source: StaticConfig) -> Self {
        let remote = test_remote();
        let store = Arc::new(CountingStore::new(InMemoryStore::new()));
        let engine = Arc::new(SyncEngine::new(
            config,
            Arc::clone(&store),
            Arc::clone(&remote),
            source,
        ));
        let ledger = PassLedger::new(Arc::clone(&engine));
        Self {
            remote,
            store,
            engine,
            ledger,
        }
    }

    /// Seeds a remote pass as another client would create it.
    ///
    /// Returns the remote id.
    pub fn remote_pass(&self, plate: &str, name: &str, balance: i64) -> i64 {
        self.remote.seed(json!({
            "name": name,
            "plate": plate,
            "vehicle_type": "car",
            "balance": balance,
            "cost_per_passage": 0,
        }))
    }

    /// Stores a local pass directly, bypassing the ledger and any push.
    pub fn local_pass(&self, new: NewPass) -> SubscriptionPass {
        self.store.create(new).expect("failed to create local pass")
    }

    /// Reads a pass by plate; panics if it is missing.
    pub fn pass(&self, plate: &str) -> SubscriptionPass {
        self.store
            .find_by_plate(plate)
            .expect("store read failed")
            .unwrap_or_else(|| panic!("no pass for plate {plate}"))
    }
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// A file-backed store in a temporary directory.
pub struct TempFileStore {
    /// The store.
    pub store: FileStore,
    dir: TempDir,
}

impl TempFileStore {
    /// Opens an empty store.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp directory");
        let store = FileStore::open(&dir.path().join("store")).expect("failed to open store");
        Self { store, dir }
    }

    /// Closes the store and opens it again from disk.
    pub fn reopen(self) -> Self {
        let Self { store, dir } = self;
        drop(store);
        let store = FileStore::open(&dir.path().join("store")).expect("failed to reopen store");
        Self { store, dir }
    }
}

impl Default for TempFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempFileStore {
    type Target = FileStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
