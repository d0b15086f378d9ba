//! Error types for store operations.

use crate::types::PassId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The snapshot could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The snapshot decoded but violates a store invariant.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Another record already uses this plate.
    #[error("plate already registered: {plate}")]
    DuplicatePlate {
        /// The conflicting plate.
        plate: String,
    },

    /// No record with this id.
    #[error("pass not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: PassId,
    },

    /// A field value violates a record invariant.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The store directory is held by another process.
    #[error("store is locked by another process: {}", .0.display())]
    Locked(PathBuf),
}

impl StoreError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
