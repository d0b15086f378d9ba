//! CLI command implementations.

pub mod pass;
pub mod sync;

use clap::ValueEnum;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tollpass_remote::{BlockingHttpClient, JsonRpcLink};
use tollpass_store::FileStore;
use tollpass_sync::{JsonFileConfig, PassLedger, SyncConfig, SyncEngine};

/// Result type for commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// The link the CLI talks to the peer with.
pub type Link = JsonRpcLink<BlockingHttpClient>;

/// Engine over the file store and the JSON-RPC link.
pub type Engine = SyncEngine<FileStore, Link>;

/// Ledger over the file store and the JSON-RPC link.
pub type Ledger = PassLedger<FileStore, Link>;

/// Usage errors detected by the CLI itself.
#[derive(Debug, Error)]
pub enum CliError {
    /// The watch interval must be at least one second.
    #[error("watch interval must be at least 1 second")]
    ZeroInterval,

    /// `update` was called without any field to change.
    #[error("nothing to update: pass at least one of --new-plate, --holder, --class, --cost")]
    EmptyUpdate,
}

/// Output format for pass listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Everything a command needs.
pub struct Context {
    /// Sync engine.
    pub engine: Arc<Engine>,
    /// Ledger over the same engine.
    pub ledger: Ledger,
}

impl Context {
    /// Opens the store and wires the engine to the remote settings file.
    ///
    /// The settings file is only read when a command reaches the remote.
    pub fn open(store: &Path, config: &Path, timeout: Duration) -> CliResult<Self> {
        let store = FileStore::open(store)?;
        let link = JsonRpcLink::new(BlockingHttpClient::new()?).with_timeout(timeout);
        let engine = Arc::new(SyncEngine::new(
            SyncConfig::default(),
            Arc::new(store),
            Arc::new(link),
            JsonFileConfig::new(config),
        ));
        let ledger = PassLedger::new(Arc::clone(&engine));
        Ok(Self { engine, ledger })
    }
}
