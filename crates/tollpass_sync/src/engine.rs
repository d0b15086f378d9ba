//! The sync engine: push, pull and the merge rule.
//!
//! Origin semantics live here and nowhere else. A pass authored remotely is
//! never pushed back (echo suppression); a pass authored locally is never
//! overwritten by a pull while its own changes are still unacknowledged.
//! Everything else is last-writer-wins by direction.

use crate::config::{stale_cutoff, ConfigSource, RemoteConfig, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::locks::PlateLocks;
use crate::payload::{apply_label, push_payload, row_plate, RemoteRecord, REMOTE_FIELDS};
use crate::report::{CycleReport, PullReport, PushOutcome, PushReport, RecordFailure};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tollpass_remote::{RemoteCall, RemoteLink, Session, TransportError};
use tollpass_store::{
    LocalStore, NewPass, Origin, PassFilter, PassId, PassPatch, RemoteRef, SubscriptionPass,
};
use tracing::{debug, error, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle has run yet.
    Idle,
    /// Resolving configuration and logging in.
    Connecting,
    /// Pushing stale local passes.
    Pushing,
    /// Pulling remote passes.
    Pulling,
    /// The last cycle completed.
    Synced,
    /// The last cycle failed.
    Error,
}

impl SyncState {
    /// Returns true while a cycle is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Connecting | SyncState::Pushing | SyncState::Pulling
        )
    }
}

/// Counters over the engine's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that completed.
    pub cycles_completed: u64,
    /// Passes acknowledged by the remote.
    pub records_pushed: u64,
    /// Local passes created or overwritten by pulls.
    pub records_pulled: u64,
    /// Per-record failures collected by cycles.
    pub record_failures: u64,
    /// End of the last completed cycle.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Error of the last failed cycle, cleared by the next success.
    pub last_error: Option<String>,
}

/// An authenticated session plus the settings it was opened with.
pub(crate) struct Connection {
    session: Session,
    remote: RemoteConfig,
}

/// A push result together with the pass as stored afterwards.
pub(crate) struct Pushed {
    pub outcome: PushOutcome,
    pub pass: SubscriptionPass,
}

enum Merge {
    Created,
    Updated,
    Deferred,
}

struct CycleFlag<'a>(&'a AtomicBool);

impl Drop for CycleFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Keeps a [`LocalStore`] and a remote peer consistent.
pub struct SyncEngine<S: LocalStore, L: RemoteLink> {
    config: SyncConfig,
    source: Arc<dyn ConfigSource>,
    store: Arc<S>,
    link: Arc<L>,
    locks: PlateLocks,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cycle_running: AtomicBool,
}

impl<S: LocalStore, L: RemoteLink> SyncEngine<S, L> {
    /// Creates an engine.
    ///
    /// `source` is consulted once per remote operation or cycle, never
    /// cached.
    pub fn new(
        config: SyncConfig,
        store: Arc<S>,
        link: Arc<L>,
        source: impl ConfigSource + 'static,
    ) -> Self {
        Self {
            config,
            source: Arc::new(source),
            store,
            link,
            locks: PlateLocks::new(),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cycle_running: AtomicBool::new(false),
        }
    }

    /// Engine tuning.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The local store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The remote link.
    pub fn link(&self) -> &Arc<L> {
        &self.link
    }

    /// Per-plate locks shared with the ledger.
    pub fn locks(&self) -> &PlateLocks {
        &self.locks
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Pushes one pass to the remote.
    ///
    /// The pass is re-read under its plate lock, so a stale copy is fine.
    /// Remote-origin passes and linked passes with nothing pending are
    /// skipped without touching configuration or network. On failure the
    /// local record is left exactly as it was.
    pub fn push_one(&self, pass: &SubscriptionPass) -> SyncResult<PushOutcome> {
        self.with_record(pass.id, &pass.plate, |current| {
            self.push_locked(current, &mut None).map(|pushed| pushed.outcome)
        })
    }

    /// Push step for a pass whose plate lock the caller already holds.
    pub(crate) fn push_locked(
        &self,
        pass: &SubscriptionPass,
        connection: &mut Option<Connection>,
    ) -> SyncResult<Pushed> {
        let skipped = |outcome| {
            Ok(Pushed {
                outcome,
                pass: pass.clone(),
            })
        };

        if pass.origin == Origin::Remote {
            debug!(plate = %pass.plate, "remote-origin pass, push suppressed");
            return skipped(PushOutcome::Suppressed);
        }
        if pass.is_linked() && !pass.pending_push {
            debug!(plate = %pass.plate, "nothing pending, push skipped");
            return skipped(PushOutcome::Unchanged);
        }

        let conn = self.connection(connection)?;
        self.push_with(conn, pass)
    }

    /// Sends `pass` unconditionally and records the acknowledgement.
    fn push_with(&self, conn: &Connection, pass: &SubscriptionPass) -> SyncResult<Pushed> {
        let payload = push_payload(pass, conn.remote.label_prefix());

        let outcome = match pass.remote_ref {
            Some(remote_ref) => {
                let call =
                    RemoteCall::write(&self.config.resource, &[remote_ref.as_i64()], payload);
                let result = self.link.invoke(&conn.session, &call)?;
                if result.as_bool() != Some(true) {
                    return Err(TransportError::malformed(format!(
                        "write of {remote_ref} returned {result}"
                    ))
                    .into());
                }
                PushOutcome::Written(remote_ref)
            }
            None => {
                let call = RemoteCall::create(&self.config.resource, payload);
                let result = self.link.invoke(&conn.session, &call)?;
                let id = result.as_i64().filter(|id| *id > 0).ok_or_else(|| {
                    TransportError::malformed(format!("create returned {result}"))
                })?;
                PushOutcome::Created(RemoteRef::new(id))
            }
        };

        let mut patch = PassPatch::new()
            .last_sync_at(Utc::now())
            .pending_push(false);
        if let PushOutcome::Created(remote_ref) = outcome {
            patch = patch.remote_ref(remote_ref);
        }

        let stored = self.store.update(pass.id, &patch).map_err(|e| {
            if let PushOutcome::Created(remote_ref) = outcome {
                error!(
                    plate = %pass.plate,
                    %remote_ref,
                    error = %e,
                    "remote record created but the local link was not saved"
                );
            }
            e
        })?;

        debug!(plate = %stored.plate, ?outcome, "pass pushed");
        self.stats.write().records_pushed += 1;
        Ok(Pushed {
            outcome,
            pass: stored,
        })
    }

    /// Re-pushes local-origin linked passes not synced within the staleness
    /// threshold. Per-record failures are collected in the report.
    ///
    /// # Errors
    ///
    /// Store listing, configuration and login failures abort the batch.
    pub fn push_pending(&self) -> SyncResult<PushReport> {
        self.push_stale(&mut None)
    }

    /// Pushes local-origin passes that were never linked.
    pub fn push_unlinked(&self) -> SyncResult<PushReport> {
        let filter = PassFilter::all().origin(Origin::Local).linked(false);
        self.push_batch(&filter, &mut None)
    }

    fn push_stale(&self, connection: &mut Option<Connection>) -> SyncResult<PushReport> {
        let cutoff = stale_cutoff(Utc::now(), self.config.staleness);
        let filter = PassFilter::all()
            .origin(Origin::Local)
            .linked(true)
            .stale_before(cutoff);
        self.push_batch(&filter, connection)
    }

    fn push_batch(
        &self,
        filter: &PassFilter,
        connection: &mut Option<Connection>,
    ) -> SyncResult<PushReport> {
        let candidates = self.store.list(filter)?;
        let mut report = PushReport::default();
        if candidates.is_empty() {
            return Ok(report);
        }

        let conn = self.connection(connection)?;
        for candidate in candidates {
            report.attempted += 1;
            // The pass may have changed between listing and locking.
            let result = self.with_record(candidate.id, &candidate.plate, |current| {
                if filter.matches(current) {
                    self.push_with(conn, current).map(Some)
                } else {
                    Ok(None)
                }
            });

            match result {
                Ok(Some(_)) => report.pushed += 1,
                Ok(None) => report.skipped += 1,
                Err(error) => {
                    warn!(plate = %candidate.plate, %error, "push failed");
                    report.failures.push(RecordFailure {
                        plate: candidate.plate,
                        error,
                    });
                }
            }
        }

        debug!(
            attempted = report.attempted,
            pushed = report.pushed,
            failed = report.failures.len(),
            "push batch finished"
        );
        Ok(report)
    }

    /// Fetches every remote pass and merges it into the local store.
    ///
    /// Rows that cannot be decoded or stored are collected in the report.
    ///
    /// # Errors
    ///
    /// Configuration, login and `search_read` failures abort the pull.
    pub fn pull_all(&self) -> SyncResult<PullReport> {
        self.pull_with(&mut None)
    }

    fn pull_with(&self, connection: &mut Option<Connection>) -> SyncResult<PullReport> {
        let conn = self.connection(connection)?;
        let call = RemoteCall::search_read(&self.config.resource, json!([]), &REMOTE_FIELDS);
        let fetched_at = Utc::now();
        let Value::Array(rows) = self.link.invoke(&conn.session, &call)? else {
            return Err(TransportError::malformed("search_read did not return a list").into());
        };

        let mut report = PullReport {
            fetched: rows.len(),
            ..PullReport::default()
        };

        for row in &rows {
            let merged = RemoteRecord::decode(row)
                .map_err(SyncError::from)
                .and_then(|record| self.merge(&record, conn.remote.label_prefix(), fetched_at));

            match merged {
                Ok(Merge::Created) => report.created += 1,
                Ok(Merge::Updated) => report.updated += 1,
                Ok(Merge::Deferred) => report.deferred += 1,
                Err(error) => {
                    let plate = row_plate(row);
                    warn!(%plate, %error, "remote row not merged");
                    report.failures.push(RecordFailure { plate, error });
                }
            }
        }

        self.stats.write().records_pulled += (report.created + report.updated) as u64;
        debug!(
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            deferred = report.deferred,
            "pull finished"
        );
        Ok(report)
    }

    fn merge(
        &self,
        record: &RemoteRecord,
        label_prefix: Option<&str>,
        fetched_at: DateTime<Utc>,
    ) -> SyncResult<Merge> {
        // Hold the row's plate and the plate of the pass linked to the row,
        // which differ when the remote renamed the record.
        let (_guard, by_plate, linked) = loop {
            let linked_plate = self.find_linked(record.remote_ref)?.map(|pass| pass.plate);
            let mut plates = vec![record.plate.as_str()];
            plates.extend(linked_plate.as_deref());
            let guard = self.locks.lock_all(&plates);

            let linked = self.find_linked(record.remote_ref)?;
            if linked
                .as_ref()
                .is_some_and(|pass| !guard.plates().contains(&pass.plate))
            {
                // Renamed locally while we waited.
                continue;
            }
            break (guard, self.store.find_by_plate(&record.plate)?, linked);
        };

        let existing = match (by_plate, linked) {
            (Some(local), Some(other)) if local.id != other.id => {
                return Err(SyncError::LinkConflict {
                    plate: record.plate.clone(),
                    remote_ref: record.remote_ref,
                    linked_plate: other.plate,
                });
            }
            (Some(local), _) => Some(local),
            (None, linked) => linked,
        };
        let name = apply_label(&record.name, label_prefix);

        match existing {
            Some(local) if keeps_local(&local, fetched_at) => {
                debug!(plate = %local.plate, "local changes newer than remote row, pull deferred");
                Ok(Merge::Deferred)
            }
            Some(local) => {
                let patch = PassPatch::new()
                    .holder_name(name)
                    .plate(record.plate.as_str())
                    .vehicle_class(record.vehicle_class)
                    .balance(record.balance)
                    .remote_ref(record.remote_ref)
                    .last_sync_at(fetched_at)
                    .origin(Origin::Remote)
                    .pending_push(false);
                self.store.update(local.id, &patch)?;
                debug!(
                    plate = %record.plate,
                    remote_ref = %record.remote_ref,
                    "pass overwritten from remote"
                );
                Ok(Merge::Updated)
            }
            None => {
                let new = NewPass::from_remote(
                    record.remote_ref,
                    record.plate.as_str(),
                    name,
                    record.vehicle_class,
                    record.balance,
                    fetched_at,
                )
                .with_cost_per_passage(self.config.default_cost_per_passage);
                self.store.create(new)?;
                debug!(
                    plate = %record.plate,
                    remote_ref = %record.remote_ref,
                    "pass created from remote"
                );
                Ok(Merge::Created)
            }
        }
    }

    fn find_linked(&self, remote_ref: RemoteRef) -> SyncResult<Option<SubscriptionPass>> {
        let filter = PassFilter::all().remote_ref(remote_ref);
        Ok(self.store.list(&filter)?.into_iter().next())
    }

    /// One scheduled cycle: push stale passes, then pull everything, on a
    /// single session.
    ///
    /// # Errors
    ///
    /// [`SyncError::CycleInProgress`] if a cycle is already running on this
    /// engine; otherwise whatever aborted the cycle.
    pub fn cron_sync(&self) -> SyncResult<CycleReport> {
        if self.cycle_running.swap(true, Ordering::SeqCst) {
            return Err(SyncError::CycleInProgress);
        }
        let _running = CycleFlag(&self.cycle_running);

        let start = Instant::now();
        match self.run_cycle(start) {
            Ok(report) => {
                self.set_state(SyncState::Synced);
                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.record_failures += report.failure_count() as u64;
                    stats.last_sync_time = Some(Utc::now());
                    stats.last_error = None;
                }
                info!(
                    pushed = report.push.pushed,
                    created = report.pull.created,
                    updated = report.pull.updated,
                    deferred = report.pull.deferred,
                    failures = report.failure_count(),
                    duration_ms = report.duration.as_millis() as u64,
                    "sync cycle complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    fn run_cycle(&self, start: Instant) -> SyncResult<CycleReport> {
        self.set_state(SyncState::Connecting);
        let mut connection = Some(self.connect()?);

        self.set_state(SyncState::Pushing);
        let push = self.push_stale(&mut connection)?;

        self.set_state(SyncState::Pulling);
        let pull = self.pull_with(&mut connection)?;

        Ok(CycleReport {
            push,
            pull,
            duration: start.elapsed(),
        })
    }

    fn handle_error(&self, error: &SyncError) {
        self.set_state(SyncState::Error);
        self.stats.write().last_error = Some(error.to_string());
        warn!(%error, "sync cycle failed");
    }

    fn connect(&self) -> SyncResult<Connection> {
        let remote = self.source.resolve()?;
        remote.validate()?;
        let session = self
            .link
            .authenticate(remote.endpoint.trim(), &remote.credentials())?;
        debug!(endpoint = %session.endpoint(), uid = session.uid(), "remote session opened");
        Ok(Connection { session, remote })
    }

    /// Opens the connection on first use.
    fn connection<'c>(&self, slot: &'c mut Option<Connection>) -> SyncResult<&'c Connection> {
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.connect()?,
        };
        Ok(slot.insert(conn))
    }

    /// Runs `f` on the current version of a pass while holding its plate.
    fn with_record<T>(
        &self,
        id: PassId,
        plate: &str,
        f: impl FnOnce(&SubscriptionPass) -> SyncResult<T>,
    ) -> SyncResult<T> {
        let guard = self.locks.lock(plate);
        let current = self.store.get(id)?.ok_or_else(|| SyncError::NotFound {
            plate: plate.to_string(),
        })?;
        if current.plate != plate.trim() {
            // Renamed meanwhile; serialize on the new plate instead.
            drop(guard);
            return self.with_record(id, &current.plate, f);
        }
        f(&current)
    }
}

/// Whether a pulled row must leave this local pass alone.
///
/// Unacknowledged local changes win, and so does a push that landed after
/// the rows were fetched: the row predates it.
fn keeps_local(local: &SubscriptionPass, fetched_at: DateTime<Utc>) -> bool {
    if local.origin != Origin::Local {
        return false;
    }
    (local.is_linked() && local.pending_push)
        || local.last_sync_at.is_some_and(|at| at >= fetched_at)
}

impl<S: LocalStore, L: RemoteLink> std::fmt::Debug for SyncEngine<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
