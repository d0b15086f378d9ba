//! The remote link contract.

use crate::error::RemoteResult;
use serde_json::{Map, Value};
use std::fmt;
use zeroize::Zeroizing;

/// A remote link authenticates against the peer and invokes named
/// operations on its resources.
///
/// This trait abstracts the RPC layer so the sync engine does not depend on
/// a particular transport (JSON-RPC over HTTP, XML-RPC, in-memory peer for
/// testing, etc.).
///
/// Implementations perform network I/O only. They never retry; every
/// failure of the underlying call is returned as
/// [`RemoteError::Transport`](crate::RemoteError::Transport) with its
/// original message.
pub trait RemoteLink: Send + Sync {
    /// Obtains a session for `credentials` at `endpoint`.
    fn authenticate(&self, endpoint: &str, credentials: &Credentials) -> RemoteResult<Session>;

    /// Invokes `call` within `session` and returns the decoded result.
    fn invoke(&self, session: &Session, call: &RemoteCall) -> RemoteResult<Value>;
}

/// Login parameters for the remote peer.
#[derive(Clone)]
pub struct Credentials {
    /// Database (tenant) name on the peer.
    pub database: String,
    /// Login of the sync user.
    pub login: String,
    /// Password of the sync user.
    pub password: Zeroizing<String>,
}

impl Credentials {
    /// Creates a credential set.
    pub fn new(
        database: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            login: login.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("database", &self.database)
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated session.
///
/// The peer's RPC calls are stateless, so a session is just the endpoint,
/// database, user id and secret every call has to carry.
#[derive(Clone)]
pub struct Session {
    endpoint: String,
    database: String,
    uid: i64,
    password: Zeroizing<String>,
}

impl Session {
    /// Creates a session from a successful login.
    pub fn new(endpoint: impl Into<String>, credentials: &Credentials, uid: i64) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: credentials.database.clone(),
            uid,
            password: credentials.password.clone(),
        }
    }

    /// Endpoint the session was opened against.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Remote user id.
    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

/// Remote operations the sync engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create one record; returns its id.
    Create,
    /// Update records by id; returns `true`.
    Write,
    /// Search and read records; returns a list of field maps.
    SearchRead,
}

impl Operation {
    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Write => "write",
            Operation::SearchRead => "search_read",
        }
    }

    /// Parses a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "create" => Some(Operation::Create),
            "write" => Some(Operation::Write),
            "search_read" => Some(Operation::SearchRead),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of an operation on a remote resource.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    /// Resource (model) name, e.g. `subscription.pass`.
    pub resource: String,
    /// Operation to invoke.
    pub operation: Operation,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: Map<String, Value>,
}

impl RemoteCall {
    /// `create(payload)`.
    pub fn create(resource: impl Into<String>, payload: Value) -> Self {
        Self {
            resource: resource.into(),
            operation: Operation::Create,
            args: vec![payload],
            kwargs: Map::new(),
        }
    }

    /// `write([ids], payload)`.
    pub fn write(resource: impl Into<String>, ids: &[i64], payload: Value) -> Self {
        Self {
            resource: resource.into(),
            operation: Operation::Write,
            args: vec![Value::from(ids.to_vec()), payload],
            kwargs: Map::new(),
        }
    }

    /// `search_read(domain, fields=[...])`.
    pub fn search_read(resource: impl Into<String>, domain: Value, fields: &[&str]) -> Self {
        let mut kwargs = Map::new();
        kwargs.insert("fields".into(), Value::from(fields.to_vec()));
        Self {
            resource: resource.into(),
            operation: Operation::SearchRead,
            args: vec![domain],
            kwargs,
        }
    }
}
