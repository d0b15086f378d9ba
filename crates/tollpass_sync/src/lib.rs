//! # tollpass sync
//!
//! Keeps the local pass store and the remote peer consistent, and exposes
//! the ledger operations callers use.
//!
//! ## Architecture
//!
//! - [`SyncEngine`] pushes local passes (`create` / `write`) and pulls remote
//!   ones (`search_read`), merging by plate
//! - [`PassLedger`] debits, creates and edits passes, then asks the engine
//!   to push what it touched
//! - A scheduler calls [`SyncEngine::cron_sync`] periodically: push stale
//!   passes, then pull everything
//!
//! ## Key Invariants
//!
//! - A balance never goes negative
//! - Remote-origin passes are never pushed until edited locally
//! - A pull never overwrites a pass whose local changes are unacknowledged
//! - A failed push never undoes the local mutation that triggered it
//! - Work on the same plate is serialized
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tollpass_remote::MemoryRemote;
//! use tollpass_store::{InMemoryStore, VehicleClass};
//! use tollpass_sync::{
//!     PassLedger, PassRequest, RemoteConfig, StaticConfig, SyncConfig, SyncEngine,
//! };
//!
//! let remote = Arc::new(MemoryRemote::new("tolls", "sync", "pw"));
//! let engine = Arc::new(SyncEngine::new(
//!     SyncConfig::default(),
//!     Arc::new(InMemoryStore::new()),
//!     Arc::clone(&remote),
//!     StaticConfig::new(RemoteConfig::new("https://peer", "tolls", "sync", "pw")),
//! ));
//! let ledger = PassLedger::new(engine);
//!
//! ledger
//!     .create_pass(PassRequest::new("LT-204-AA", "Ada Mbina", VehicleClass::Car, 1_000))
//!     .unwrap();
//! let receipt = ledger.debit("LT-204-AA", None).unwrap();
//! assert_eq!(receipt.value.balance(), 500);
//! assert!(receipt.sync_failure.is_none());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod ledger;
mod locks;
mod payload;
mod report;

pub use config::{
    ConfigSource, JsonFileConfig, RemoteConfig, StaticConfig, SyncConfig, DEFAULT_LABEL_PREFIX,
    DEFAULT_RESOURCE, DEFAULT_STALENESS,
};
pub use engine::{SyncEngine, SyncState, SyncStats};
pub use error::{LedgerError, LedgerResult, SyncError, SyncResult};
pub use ledger::{Committed, DebitReceipt, PassLedger, PassRequest, PassUpdate};
pub use locks::{PlateGuard, PlateLocks};
pub use report::{CycleReport, PullReport, PushOutcome, PushReport, RecordFailure};
