//! Error types for synchronization and ledger operations.

use thiserror::Error;
use tollpass_remote::{RemoteError, TransportError};
use tollpass_store::{RemoteRef, StoreError};

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote connection settings are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote peer rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A remote call failed.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// Local store error during sync.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The record disappeared from the local store.
    #[error("pass not found: {plate}")]
    NotFound {
        /// Plate that was looked up.
        plate: String,
    },

    /// A remote row matches one local pass by plate while another local pass
    /// is already linked to it.
    #[error("remote #{remote_ref} ({plate}) is already linked to {linked_plate}")]
    LinkConflict {
        /// Plate carried by the remote row.
        plate: String,
        /// Remote record id.
        remote_ref: RemoteRef,
        /// Plate of the local pass already linked to the record.
        linked_plate: String,
    },

    /// Another sync cycle is already running on this engine.
    #[error("a sync cycle is already in progress")]
    CycleInProgress,
}

impl SyncError {
    /// Returns true if the operation might succeed on a later attempt.
    ///
    /// Only transport failures qualify; configuration and authentication
    /// problems need an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }

    /// Returns the transport failure, if this is one.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            SyncError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Auth(message) => SyncError::Auth(message),
            RemoteError::Transport(e) => SyncError::Transport(e),
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        SyncError::Transport(err)
    }
}

/// Errors returned by [`PassLedger`](crate::PassLedger).
#[derive(Error, Debug)]
pub enum LedgerError {
    /// No pass is registered under this plate.
    #[error("pass not found: {plate}")]
    NotFound {
        /// Plate that was looked up.
        plate: String,
    },

    /// The balance does not cover the debit.
    #[error("insufficient balance on {plate}: {balance} < {amount}")]
    InsufficientBalance {
        /// Plate of the pass.
        plate: String,
        /// Balance at the time of the debit.
        balance: i64,
        /// Requested amount.
        amount: i64,
    },

    /// Debit amounts must be positive.
    #[error("invalid debit amount: {0}")]
    InvalidAmount(i64),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
