//! # tollpass store
//!
//! Subscription pass model and the local store the ledger writes to.
//!
//! The store is the local side of the two-store ledger. It knows nothing
//! about the remote peer: it only keeps records, enforces the per-record
//! invariants and makes every single-record mutation atomic.
//!
//! ## Design Principles
//!
//! - `plate` is unique within a store and is the lookup key
//! - `balance` is never negative and `cost_per_passage` is always positive
//! - A mutation either fully applies or leaves the record untouched
//! - No cross-record transactions
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For tests and ephemeral ledgers
//! - [`FileStore`] - Directory-backed store with a CBOR snapshot
//!
//! ## Example
//!
//! ```rust
//! use tollpass_store::{InMemoryStore, LocalStore, NewPass, VehicleClass};
//!
//! let store = InMemoryStore::new();
//! let pass = store
//!     .create(NewPass::local("LT-204-AA", "Ada Mbina", VehicleClass::Car, 1_000))
//!     .unwrap();
//! assert_eq!(store.find_by_plate("LT-204-AA").unwrap(), Some(pass));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod filter;
mod memory;
mod store;
mod table;
mod types;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use filter::PassFilter;
pub use memory::InMemoryStore;
pub use store::LocalStore;
pub use types::{
    NewPass, Origin, PassId, PassPatch, RemoteRef, SubscriptionPass, UnknownVehicleClass,
    VehicleClass, DEFAULT_COST_PER_PASSAGE,
};
