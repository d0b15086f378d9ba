//! In-memory remote peer for tests.

use crate::error::{RemoteError, RemoteResult, TransportError, TransportErrorKind};
use crate::jsonrpc::{HttpClient, HttpFailure};
use crate::link::{Credentials, Operation, RemoteCall, RemoteLink, Session};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// A record operation received by a [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Target resource.
    pub resource: String,
    /// Operation name.
    pub operation: Operation,
    /// Positional arguments as received.
    pub args: Vec<Value>,
}

#[derive(Debug)]
struct PeerState {
    credentials: (String, String, String),
    uid: i64,
    next_id: i64,
    records: BTreeMap<i64, Map<String, Value>>,
    calls: Vec<RecordedCall>,
    logins: usize,
    failures: VecDeque<TransportError>,
    offline: bool,
}

/// A remote peer that keeps its records in memory.
///
/// It implements [`RemoteLink`] directly and also answers JSON-RPC bodies
/// through [`LoopbackClient`], so the same peer can sit behind either side
/// of the link.
///
/// Failures can be injected: [`fail_next`](Self::fail_next) queues an error
/// for the next record operation, [`set_offline`](Self::set_offline) makes
/// every call fail with a connection error.
#[derive(Debug)]
pub struct MemoryRemote {
    state: Mutex<PeerState>,
}

impl MemoryRemote {
    /// Creates a peer accepting exactly these credentials.
    pub fn new(database: &str, login: &str, password: &str) -> Self {
        Self {
            state: Mutex::new(PeerState {
                credentials: (database.into(), login.into(), password.into()),
                uid: 2,
                next_id: 1,
                records: BTreeMap::new(),
                calls: Vec::new(),
                logins: 0,
                failures: VecDeque::new(),
                offline: false,
            }),
        }
    }

    /// Stores a record directly, as if another client had created it.
    ///
    /// Not recorded as a call. Returns the new id.
    pub fn seed(&self, fields: Value) -> i64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let mut record = fields.as_object().cloned().unwrap_or_default();
        record.insert("id".into(), Value::from(id));
        state.records.insert(id, record);
        id
    }

    /// Overwrites one field of a stored record, as a remote-side edit.
    ///
    /// Returns false if the record does not exist.
    pub fn edit(&self, id: i64, field: &str, value: Value) -> bool {
        match self.state.lock().records.get_mut(&id) {
            Some(record) => {
                record.insert(field.into(), value);
                true
            }
            None => false,
        }
    }

    /// Returns a stored record.
    pub fn record(&self, id: i64) -> Option<Value> {
        self.state
            .lock()
            .records
            .get(&id)
            .cloned()
            .map(Value::Object)
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Every record operation received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Number of received calls of one operation.
    pub fn call_count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of successful logins.
    pub fn login_count(&self) -> usize {
        self.state.lock().logins
    }

    /// Makes the next record operation fail with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.state.lock().failures.push_back(error);
    }

    /// Makes every call fail with a connection error while set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Answers a JSON-RPC request body the way the real peer would.
    ///
    /// Injected transport failures surface as the matching HTTP failure;
    /// faults and auth failures become JSON-RPC error objects.
    pub fn handle_jsonrpc(&self, body: &[u8]) -> Result<Vec<u8>, HttpFailure> {
        let request: Value = serde_json::from_slice(body).map_err(|e| HttpFailure::Status {
            code: 400,
            body: e.to_string(),
        })?;
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let params = &request["params"];
        let args = params["args"].as_array().cloned().unwrap_or_default();

        let outcome = match (params["service"].as_str(), params["method"].as_str()) {
            (Some("common"), Some("login")) => {
                let text = |i: usize| args.get(i).and_then(Value::as_str).unwrap_or_default();
                let credentials = Credentials::new(text(0), text(1), text(2));
                match self.authenticate("loopback", &credentials) {
                    Ok(session) => Ok(Value::from(session.uid())),
                    Err(RemoteError::Auth(_)) => Ok(Value::Bool(false)),
                    Err(e) => Err(e),
                }
            }
            (Some("object"), Some("execute_kw")) => self.execute_kw(&args),
            _ => Err(TransportError::fault(404, "unknown service or method").into()),
        };

        let response = match outcome {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(RemoteError::Transport(e)) => match e.kind {
                TransportErrorKind::Timeout => return Err(HttpFailure::Timeout(e.message)),
                TransportErrorKind::HttpStatus(code) => {
                    return Err(HttpFailure::Status {
                        code,
                        body: e.message,
                    })
                }
                TransportErrorKind::Connect => return Err(HttpFailure::Connect(e.message)),
                TransportErrorKind::Malformed => return Ok(e.message.into_bytes()),
                TransportErrorKind::Fault(code) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": code,
                        "message": "Server Error",
                        "data": {"message": e.message},
                    },
                }),
            },
            Err(RemoteError::Auth(message)) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": 100, "message": "Session Expired", "data": {"message": message}},
            }),
        };

        serde_json::to_vec(&response).map_err(|e| HttpFailure::Status {
            code: 500,
            body: e.to_string(),
        })
    }

    fn execute_kw(&self, args: &[Value]) -> RemoteResult<Value> {
        let text = |i: usize| args.get(i).and_then(Value::as_str).unwrap_or_default();
        let uid = args.get(1).and_then(Value::as_i64).unwrap_or_default();
        let operation = Operation::from_name(text(4))
            .ok_or_else(|| TransportError::fault(200, format!("unsupported method {}", text(4))))?;

        let credentials = {
            let state = self.state.lock();
            Credentials::new(text(0), state.credentials.1.clone(), text(2))
        };
        let session = Session::new("loopback", &credentials, uid);
        let call = RemoteCall {
            resource: text(3).to_string(),
            operation,
            args: args.get(5).and_then(Value::as_array).cloned().unwrap_or_default(),
            kwargs: args.get(6).and_then(Value::as_object).cloned().unwrap_or_default(),
        };
        self.invoke(&session, &call)
    }
}

impl RemoteLink for MemoryRemote {
    fn authenticate(&self, endpoint: &str, credentials: &Credentials) -> RemoteResult<Session> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(TransportError::connect(format!("{endpoint} unreachable")).into());
        }

        let (database, login, password) = &state.credentials;
        if credentials.database != *database
            || credentials.login != *login
            || credentials.password.as_str() != password
        {
            return Err(RemoteError::Auth(format!(
                "login rejected for {} on {}",
                credentials.login, credentials.database
            )));
        }

        state.logins += 1;
        Ok(Session::new(endpoint, credentials, state.uid))
    }

    fn invoke(&self, session: &Session, call: &RemoteCall) -> RemoteResult<Value> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(TransportError::connect("peer unreachable").into());
        }
        if session.uid() != state.uid || session.password() != state.credentials.2 {
            return Err(RemoteError::Auth("invalid session".into()));
        }

        state.calls.push(RecordedCall {
            resource: call.resource.clone(),
            operation: call.operation,
            args: call.args.clone(),
        });

        if let Some(failure) = state.failures.pop_front() {
            return Err(failure.into());
        }

        match call.operation {
            Operation::Create => {
                let fields = call
                    .args
                    .first()
                    .and_then(Value::as_object)
                    .ok_or_else(|| TransportError::fault(200, "create expects a field map"))?;
                let id = state.next_id;
                state.next_id += 1;
                let mut record = fields.clone();
                record.insert("id".into(), Value::from(id));
                state.records.insert(id, record);
                Ok(Value::from(id))
            }
            Operation::Write => {
                let ids: Vec<i64> = call
                    .args
                    .first()
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                let fields = call
                    .args
                    .get(1)
                    .and_then(Value::as_object)
                    .ok_or_else(|| TransportError::fault(200, "write expects a field map"))?;

                if let Some(missing) = ids.iter().find(|id| !state.records.contains_key(*id)) {
                    return Err(TransportError::fault(
                        200,
                        format!("record {missing} does not exist or has been deleted"),
                    )
                    .into());
                }
                for id in ids {
                    if let Some(record) = state.records.get_mut(&id) {
                        for (key, value) in fields {
                            if key != "id" {
                                record.insert(key.clone(), value.clone());
                            }
                        }
                    }
                }
                Ok(Value::Bool(true))
            }
            Operation::SearchRead => {
                let domain = call
                    .args
                    .first()
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let fields: Option<Vec<String>> = call
                    .kwargs
                    .get("fields")
                    .and_then(Value::as_array)
                    .map(|f| f.iter().filter_map(|v| v.as_str().map(String::from)).collect());

                let rows = state
                    .records
                    .values()
                    .filter(|record| matches_domain(record, &domain))
                    .map(|record| project(record, fields.as_deref()))
                    .collect::<Vec<_>>();
                Ok(Value::Array(rows))
            }
        }
    }
}

/// Equality-only domain: `[[field, "=", value], ...]`.
fn matches_domain(record: &Map<String, Value>, domain: &[Value]) -> bool {
    domain.iter().all(|clause| match clause.as_array().map(Vec::as_slice) {
        Some([Value::String(field), Value::String(op), value]) if op == "=" => {
            record.get(field) == Some(value)
        }
        _ => true,
    })
}

fn project(record: &Map<String, Value>, fields: Option<&[String]>) -> Value {
    let Some(fields) = fields.filter(|f| !f.is_empty()) else {
        return Value::Object(record.clone());
    };
    let mut row = Map::new();
    row.insert("id".into(), record.get("id").cloned().unwrap_or(Value::Null));
    for field in fields {
        row.insert(
            field.clone(),
            record.get(field).cloned().unwrap_or(Value::Bool(false)),
        );
    }
    Value::Object(row)
}

/// An [`HttpClient`] that routes requests straight to a [`MemoryRemote`].
///
/// Useful for exercising the JSON-RPC link without network overhead.
#[derive(Debug, Clone)]
pub struct LoopbackClient {
    peer: Arc<MemoryRemote>,
}

impl LoopbackClient {
    /// Creates a client connected to `peer`.
    pub fn new(peer: Arc<MemoryRemote>) -> Self {
        Self { peer }
    }
}

impl HttpClient for LoopbackClient {
    fn post(&self, _url: &str, body: Vec<u8>, _timeout: Duration) -> Result<Vec<u8>, HttpFailure> {
        self.peer.handle_jsonrpc(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::JsonRpcLink;

    fn peer() -> MemoryRemote {
        MemoryRemote::new("tolls", "sync", "secret")
    }

    fn credentials() -> Credentials {
        Credentials::new("tolls", "sync", "secret")
    }

    #[test]
    fn rejects_wrong_password() {
        let peer = peer();
        let err = peer
            .authenticate("mem://", &Credentials::new("tolls", "sync", "nope"))
            .unwrap_err();
        assert!(matches!(err, RemoteError::Auth(_)));
        assert_eq!(peer.login_count(), 0);
    }

    #[test]
    fn create_write_search_read() {
        let peer = peer();
        let session = peer.authenticate("mem://", &credentials()).unwrap();

        let id = peer
            .invoke(
                &session,
                &RemoteCall::create("subscription.pass", json!({"plate": "GA-1", "balance": 500})),
            )
            .unwrap();
        let id = id.as_i64().unwrap();

        let ok = peer
            .invoke(
                &session,
                &RemoteCall::write("subscription.pass", &[id], json!({"balance": 0})),
            )
            .unwrap();
        assert_eq!(ok, json!(true));

        let rows = peer
            .invoke(
                &session,
                &RemoteCall::search_read("subscription.pass", json!([]), &["plate", "balance"]),
            )
            .unwrap();
        assert_eq!(rows, json!([{"id": id, "plate": "GA-1", "balance": 0}]));
        assert_eq!(peer.calls().len(), 3);
        assert_eq!(peer.call_count(Operation::Write), 1);
    }

    #[test]
    fn write_to_missing_record_is_fault() {
        let peer = peer();
        let session = peer.authenticate("mem://", &credentials()).unwrap();
        let err = peer
            .invoke(
                &session,
                &RemoteCall::write("subscription.pass", &[99], json!({"balance": 0})),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Transport(TransportError { kind: TransportErrorKind::Fault(_), .. })
        ));
    }

    #[test]
    fn injected_failure_hits_next_call_only() {
        let peer = peer();
        let session = peer.authenticate("mem://", &credentials()).unwrap();
        peer.fail_next(TransportError::timeout("simulated"));

        let call = RemoteCall::search_read("subscription.pass", json!([]), &[]);
        assert!(peer.invoke(&session, &call).is_err());
        assert!(peer.invoke(&session, &call).is_ok());
    }

    #[test]
    fn domain_filters_rows() {
        let peer = peer();
        peer.seed(json!({"plate": "GA-1"}));
        peer.seed(json!({"plate": "GA-2"}));
        let session = peer.authenticate("mem://", &credentials()).unwrap();

        let rows = peer
            .invoke(
                &session,
                &RemoteCall::search_read(
                    "subscription.pass",
                    json!([["plate", "=", "GA-2"]]),
                    &["plate"],
                ),
            )
            .unwrap();
        assert_eq!(rows, json!([{"id": 2, "plate": "GA-2"}]));
    }

    #[test]
    fn offline_peer_refuses_connections() {
        let peer = peer();
        peer.set_offline(true);
        let err = peer.authenticate("mem://", &credentials()).unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Transport(TransportError { kind: TransportErrorKind::Connect, .. })
        ));
    }

    #[test]
    fn loopback_through_jsonrpc_link() {
        let peer = Arc::new(peer());
        let link = JsonRpcLink::new(LoopbackClient::new(Arc::clone(&peer)));

        let session = link.authenticate("https://peer", &credentials()).unwrap();
        let id = link
            .invoke(
                &session,
                &RemoteCall::create("subscription.pass", json!({"plate": "GA-7"})),
            )
            .unwrap();
        assert_eq!(peer.record(id.as_i64().unwrap()).unwrap()["plate"], "GA-7");

        let err = link
            .authenticate("https://peer", &Credentials::new("tolls", "sync", "bad"))
            .unwrap_err();
        assert!(matches!(err, RemoteError::Auth(_)));
    }

    #[test]
    fn loopback_maps_injected_failures() {
        let peer = Arc::new(peer());
        let link = JsonRpcLink::new(LoopbackClient::new(Arc::clone(&peer)));
        let session = link.authenticate("https://peer", &credentials()).unwrap();
        let call = RemoteCall::search_read("subscription.pass", json!([]), &[]);

        peer.fail_next(TransportError::timeout("simulated timeout"));
        let err = link.invoke(&session, &call).unwrap_err();
        assert!(matches!(err, RemoteError::Transport(e) if e.is_timeout()));

        peer.fail_next(TransportError::malformed("<html>proxy error</html>"));
        let err = link.invoke(&session, &call).unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Transport(TransportError { kind: TransportErrorKind::Malformed, .. })
        ));

        peer.fail_next(TransportError::fault(200, "Access denied"));
        let err = link.invoke(&session, &call).unwrap_err();
        assert_eq!(
            err,
            RemoteError::Transport(TransportError::fault(200, "Access denied"))
        );
    }
}
