//! # tollpass remote
//!
//! The link to the remote peer ledger.
//!
//! This crate provides:
//! - The [`RemoteLink`] contract: authenticate, then invoke named operations
//! - A JSON-RPC 2.0 link over a pluggable [`HttpClient`]
//! - A blocking `reqwest` HTTP client with per-call timeouts
//! - [`MemoryRemote`], an in-memory peer with failure injection for tests
//!
//! The link has no business logic and never retries. Every failure of the
//! underlying call (timeout, HTTP status, remote fault, undecodable body)
//! comes back as a [`TransportError`] carrying the original message.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod http;
mod jsonrpc;
mod link;
mod memory;

pub use error::{RemoteError, RemoteResult, TransportError, TransportErrorKind};
pub use http::BlockingHttpClient;
pub use jsonrpc::{HttpClient, HttpFailure, JsonRpcLink, DEFAULT_TIMEOUT};
pub use link::{Credentials, Operation, RemoteCall, RemoteLink, Session};
pub use memory::{LoopbackClient, MemoryRemote, RecordedCall};
