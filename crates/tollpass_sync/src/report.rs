//! Outcomes of push, pull and full sync cycles.

use crate::error::SyncError;
use std::time::Duration;
use tollpass_store::RemoteRef;

/// What a single push did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The pass is remote-authoritative; nothing was sent.
    Suppressed,
    /// The pass is linked and has nothing pending; nothing was sent.
    Unchanged,
    /// A remote record was created and the pass linked to it.
    Created(RemoteRef),
    /// The linked remote record was overwritten.
    Written(RemoteRef),
}

impl PushOutcome {
    /// Returns true if a remote call was made.
    pub fn reached_remote(&self) -> bool {
        matches!(self, PushOutcome::Created(_) | PushOutcome::Written(_))
    }

    /// The remote record involved, if any.
    pub fn remote_ref(&self) -> Option<RemoteRef> {
        match self {
            PushOutcome::Created(r) | PushOutcome::Written(r) => Some(*r),
            _ => None,
        }
    }
}

/// A per-record failure collected by a batch operation.
#[derive(Debug)]
pub struct RecordFailure {
    /// Plate of the record.
    pub plate: String,
    /// What went wrong.
    pub error: SyncError,
}

/// Result of a batch push.
#[derive(Debug, Default)]
pub struct PushReport {
    /// Records selected for pushing.
    pub attempted: usize,
    /// Records acknowledged by the remote.
    pub pushed: usize,
    /// Records that no longer qualified once locked.
    pub skipped: usize,
    /// Records that failed.
    pub failures: Vec<RecordFailure>,
}

/// Result of a pull.
#[derive(Debug, Default)]
pub struct PullReport {
    /// Rows returned by the remote.
    pub fetched: usize,
    /// Local passes created.
    pub created: usize,
    /// Local passes overwritten.
    pub updated: usize,
    /// Local passes left alone because their own changes are unacknowledged.
    pub deferred: usize,
    /// Rows that could not be merged.
    pub failures: Vec<RecordFailure>,
}

/// Result of a full sync cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// Push phase.
    pub push: PushReport,
    /// Pull phase.
    pub pull: PullReport,
    /// Wall time of the cycle.
    pub duration: Duration,
}

impl CycleReport {
    /// Total per-record failures across both phases.
    pub fn failure_count(&self) -> usize {
        self.push.failures.len() + self.pull.failures.len()
    }

    /// Returns true if no record failed.
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}
