//! Caller-facing balance and record operations.
//!
//! Every mutation is committed to the local store first. A push triggered by
//! the mutation runs afterwards, still under the plate lock; if it fails the
//! mutation stands and the failure is handed back next to the result.

use crate::engine::SyncEngine;
use crate::error::{LedgerError, LedgerResult, SyncError};
use std::sync::Arc;
use tollpass_remote::RemoteLink;
use tollpass_store::{
    LocalStore, NewPass, Origin, PassFilter, PassPatch, SubscriptionPass, VehicleClass,
};
use tracing::{debug, info, warn};

/// A committed local mutation and the outcome of the push it triggered.
#[derive(Debug)]
#[must_use]
pub struct Committed<T> {
    /// The committed result.
    pub value: T,
    /// Set when the follow-up push failed. The mutation is not undone.
    pub sync_failure: Option<SyncError>,
}

impl<T> Committed<T> {
    fn clean(value: T) -> Self {
        Self {
            value,
            sync_failure: None,
        }
    }

    /// Returns true if the follow-up push failed.
    pub fn has_sync_failure(&self) -> bool {
        self.sync_failure.is_some()
    }

    /// Discards the sync outcome.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Result of a successful debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitReceipt {
    /// Amount taken.
    pub amount: i64,
    /// The pass after the debit.
    pub pass: SubscriptionPass,
}

impl DebitReceipt {
    /// Balance left after the debit.
    pub fn balance(&self) -> i64 {
        self.pass.balance
    }
}

/// Fields for a new pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRequest {
    /// Vehicle plate.
    pub plate: String,
    /// Name of the subscriber.
    pub holder_name: String,
    /// Vehicle category.
    pub vehicle_class: VehicleClass,
    /// Opening balance.
    pub balance: i64,
    /// Cost per passage; the engine default when unset.
    pub cost_per_passage: Option<i64>,
}

impl PassRequest {
    /// Creates a request using the default cost per passage.
    pub fn new(
        plate: impl Into<String>,
        holder_name: impl Into<String>,
        vehicle_class: VehicleClass,
        balance: i64,
    ) -> Self {
        Self {
            plate: plate.into(),
            holder_name: holder_name.into(),
            vehicle_class,
            balance,
            cost_per_passage: None,
        }
    }

    /// Sets the cost per passage.
    pub fn with_cost_per_passage(mut self, cost: i64) -> Self {
        self.cost_per_passage = Some(cost);
        self
    }
}

/// Edits to an existing pass. The balance only moves through debits and
/// pulls, so it is not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassUpdate {
    /// New plate.
    pub plate: Option<String>,
    /// New holder name.
    pub holder_name: Option<String>,
    /// New vehicle class.
    pub vehicle_class: Option<VehicleClass>,
    /// New cost per passage.
    pub cost_per_passage: Option<i64>,
}

impl PassUpdate {
    /// An empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the plate.
    pub fn plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = Some(plate.into());
        self
    }

    /// Changes the holder name.
    pub fn holder_name(mut self, name: impl Into<String>) -> Self {
        self.holder_name = Some(name.into());
        self
    }

    /// Changes the vehicle class.
    pub fn vehicle_class(mut self, class: VehicleClass) -> Self {
        self.vehicle_class = Some(class);
        self
    }

    /// Changes the cost per passage.
    pub fn cost_per_passage(mut self, cost: i64) -> Self {
        self.cost_per_passage = Some(cost);
        self
    }

    /// Returns true if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.plate.is_none()
            && self.holder_name.is_none()
            && self.vehicle_class.is_none()
            && self.cost_per_passage.is_none()
    }

    /// Returns true if a field the remote mirrors would change on `pass`.
    fn changes_identity(&self, pass: &SubscriptionPass) -> bool {
        self.plate.as_deref().is_some_and(|p| p.trim() != pass.plate)
            || self
                .holder_name
                .as_deref()
                .is_some_and(|n| n != pass.holder_name)
            || self.vehicle_class.is_some_and(|c| c != pass.vehicle_class)
    }
}

/// Balance and record operations over a [`SyncEngine`].
pub struct PassLedger<S: LocalStore, L: RemoteLink> {
    engine: Arc<SyncEngine<S, L>>,
}

impl<S: LocalStore, L: RemoteLink> PassLedger<S, L> {
    /// Creates a ledger sharing `engine`'s store and plate locks.
    pub fn new(engine: Arc<SyncEngine<S, L>>) -> Self {
        Self { engine }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &Arc<SyncEngine<S, L>> {
        &self.engine
    }

    /// Looks up a pass by plate.
    pub fn get(&self, plate: &str) -> LedgerResult<SubscriptionPass> {
        self.find(plate.trim())
    }

    /// Lists passes matching `filter`.
    pub fn list(&self, filter: &PassFilter) -> LedgerResult<Vec<SubscriptionPass>> {
        Ok(self.engine.store().list(filter)?)
    }

    /// Debits one passage, or `amount` when given.
    ///
    /// The pass becomes locally authoritative with a pending push. Linked
    /// passes are pushed right away.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientBalance`] leaves the balance unchanged.
    pub fn debit(&self, plate: &str, amount: Option<i64>) -> LedgerResult<Committed<DebitReceipt>> {
        let plate = plate.trim();
        let _guard = self.engine.locks().lock(plate);
        let pass = self.find(plate)?;

        let amount = amount.unwrap_or(pass.cost_per_passage);
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if !pass.can_cover(amount) {
            debug!(plate, balance = pass.balance, amount, "debit refused");
            return Err(LedgerError::InsufficientBalance {
                plate: pass.plate,
                balance: pass.balance,
                amount,
            });
        }

        let patch = PassPatch::new()
            .balance(pass.balance - amount)
            .origin(Origin::Local)
            .pending_push(true);
        let debited = self.engine.store().update(pass.id, &patch)?;
        info!(plate, amount, balance = debited.balance, "passage debited");

        let committed = if debited.is_linked() {
            self.push_after_commit(debited)
        } else {
            Committed::clean(debited)
        };
        Ok(Committed {
            value: DebitReceipt {
                amount,
                pass: committed.value,
            },
            sync_failure: committed.sync_failure,
        })
    }

    /// Registers a new local pass and pushes it.
    ///
    /// # Errors
    ///
    /// Store validation errors, including a duplicate plate.
    pub fn create_pass(&self, request: PassRequest) -> LedgerResult<Committed<SubscriptionPass>> {
        let plate = request.plate.trim().to_string();
        let _guard = self.engine.locks().lock(&plate);

        let cost = request
            .cost_per_passage
            .unwrap_or(self.engine.config().default_cost_per_passage);
        let new = NewPass::local(
            plate.as_str(),
            request.holder_name,
            request.vehicle_class,
            request.balance,
        )
        .with_cost_per_passage(cost);
        let created = self.engine.store().create(new)?;
        info!(plate = %created.plate, id = %created.id, "pass created");

        Ok(self.push_after_commit(created))
    }

    /// Edits a pass.
    ///
    /// Changing the plate, holder or class makes the pass locally
    /// authoritative and pushes it if linked. A cost-only change stays local.
    pub fn update_pass(
        &self,
        plate: &str,
        update: PassUpdate,
    ) -> LedgerResult<Committed<SubscriptionPass>> {
        let plate = plate.trim();
        let mut plates = vec![plate];
        plates.extend(update.plate.as_deref().map(str::trim));
        let _guard = self.engine.locks().lock_all(&plates);

        let pass = self.find(plate)?;
        if update.is_empty() {
            return Ok(Committed::clean(pass));
        }

        let identity = update.changes_identity(&pass);
        let mut patch = PassPatch {
            plate: update.plate,
            holder_name: update.holder_name,
            vehicle_class: update.vehicle_class,
            cost_per_passage: update.cost_per_passage,
            ..PassPatch::default()
        };
        if identity {
            patch = patch.origin(Origin::Local).pending_push(true);
        }

        let updated = self.engine.store().update(pass.id, &patch)?;
        info!(plate = %updated.plate, identity, "pass updated");

        if identity && updated.is_linked() {
            Ok(self.push_after_commit(updated))
        } else {
            Ok(Committed::clean(updated))
        }
    }

    fn find(&self, plate: &str) -> LedgerResult<SubscriptionPass> {
        self.engine
            .store()
            .find_by_plate(plate)?
            .ok_or_else(|| LedgerError::NotFound {
                plate: plate.to_string(),
            })
    }

    /// Pushes a just-committed pass. The caller holds its plate lock.
    fn push_after_commit(&self, pass: SubscriptionPass) -> Committed<SubscriptionPass> {
        if !self.engine.config().auto_push {
            return Committed::clean(pass);
        }
        match self.engine.push_locked(&pass, &mut None) {
            Ok(pushed) => Committed::clean(pushed.pass),
            Err(error) => {
                warn!(plate = %pass.plate, %error, "committed locally, push failed");
                Committed {
                    value: pass,
                    sync_failure: Some(error),
                }
            }
        }
    }
}

impl<S: LocalStore, L: RemoteLink> std::fmt::Debug for PassLedger<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassLedger")
            .field("engine", &self.engine)
            .finish()
    }
}
