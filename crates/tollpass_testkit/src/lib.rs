//! # tollpass testkit
//!
//! Test utilities for tollpass.
//!
//! This crate provides:
//! - A ready-wired ledger over an in-memory store and remote peer
//! - A store wrapper that counts mutations
//! - Property-based test generators using proptest
//! - Concurrent debit helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tollpass_testkit::prelude::*;
//!
//! #[test]
//! fn debit_then_sync() {
//!     let harness = TestLedger::new();
//!     harness.remote_pass("GA-1", "Awa", 1_000);
//!     harness.engine.pull_all().unwrap();
//!     harness.ledger.debit("GA-1", None).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
