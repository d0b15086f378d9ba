//! JSON-RPC 2.0 link implementation.
//!
//! The actual HTTP client is abstracted via a trait so the link can run over
//! `reqwest`, a loopback peer in tests, or any other byte transport.

use crate::error::{RemoteError, RemoteResult, TransportError, TransportErrorKind};
use crate::link::{Credentials, RemoteCall, RemoteLink, Session};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default bound on a single remote call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a JSON body and returns the response body.
    ///
    /// Non-success statuses are failures.
    fn post(&self, url: &str, body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>, HttpFailure>;
}

/// Failure of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// The request timed out.
    Timeout(String),
    /// The server answered with a non-success status.
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The connection failed.
    Connect(String),
}

impl From<HttpFailure> for TransportError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Timeout(message) => TransportError::timeout(message),
            HttpFailure::Status { code, body } => TransportError::http_status(code, body),
            HttpFailure::Connect(message) => TransportError::connect(message),
        }
    }
}

/// A [`RemoteLink`] speaking JSON-RPC 2.0 to `{endpoint}/jsonrpc`.
///
/// Login goes through the `common` service, record operations through
/// `object.execute_kw`.
pub struct JsonRpcLink<C: HttpClient> {
    client: C,
    timeout: Duration,
    next_id: AtomicU64,
}

impl<C: HttpClient> JsonRpcLink<C> {
    /// Creates a link with the default timeout.
    pub fn new(client: C) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            next_id: AtomicU64::new(1),
        }
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the underlying HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn call(
        &self,
        endpoint: &str,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": service,
                "method": method,
                "args": args,
            },
            "id": id,
        });

        let body = serde_json::to_vec(&envelope)
            .map_err(|e| TransportError::malformed(format!("failed to encode request: {e}")))?;

        let url = format!("{}/jsonrpc", endpoint.trim_end_matches('/'));
        let response = self.client.post(&url, body, self.timeout)?;

        decode_response(&response)
    }
}

/// Extracts `result` from a JSON-RPC response, or turns `error` into a fault.
pub(crate) fn decode_response(bytes: &[u8]) -> Result<Value, TransportError> {
    let mut envelope: Value = serde_json::from_slice(bytes)
        .map_err(|e| TransportError::malformed(format!("invalid JSON response: {e}")))?;

    if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        // The peer puts the useful text under data.message; message is generic.
        let message = error
            .pointer("/data/message")
            .or_else(|| error.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("unknown remote error")
            .to_string();
        return Err(TransportError::fault(code, message));
    }

    envelope
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| TransportError::malformed("response has neither result nor error"))
}

impl<C: HttpClient> RemoteLink for JsonRpcLink<C> {
    fn authenticate(&self, endpoint: &str, credentials: &Credentials) -> RemoteResult<Session> {
        debug!(
            endpoint,
            database = %credentials.database,
            login = %credentials.login,
            "remote login"
        );

        let args = vec![
            Value::from(credentials.database.as_str()),
            Value::from(credentials.login.as_str()),
            Value::from(credentials.password.as_str()),
        ];
        let result = match self.call(endpoint, "common", "login", args) {
            Ok(result) => result,
            Err(e) if matches!(e.kind, TransportErrorKind::Fault(_)) => {
                return Err(RemoteError::Auth(e.message));
            }
            Err(e) => return Err(e.into()),
        };

        match result.as_i64() {
            Some(uid) if uid > 0 => Ok(Session::new(endpoint, credentials, uid)),
            _ => Err(RemoteError::Auth(format!(
                "login rejected for {} on {}",
                credentials.login, credentials.database
            ))),
        }
    }

    fn invoke(&self, session: &Session, call: &RemoteCall) -> RemoteResult<Value> {
        debug!(
            resource = %call.resource,
            operation = %call.operation,
            "remote call"
        );

        let args = vec![
            Value::from(session.database()),
            Value::from(session.uid()),
            Value::from(session.password()),
            Value::from(call.resource.as_str()),
            Value::from(call.operation.as_str()),
            Value::from(call.args.clone()),
            Value::Object(call.kwargs.clone()),
        ];

        Ok(self.call(session.endpoint(), "object", "execute_kw", args)?)
    }
}
