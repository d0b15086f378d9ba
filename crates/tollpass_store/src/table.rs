//! The record table shared by every store implementation.

use crate::error::{StoreError, StoreResult};
use crate::filter::PassFilter;
use crate::types::{NewPass, PassId, PassPatch, SubscriptionPass};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Snapshot format version written by [`PassTable::to_snapshot`].
pub(crate) const SNAPSHOT_VERSION: u32 = 1;

/// Records keyed by id, with a plate index.
#[derive(Debug, Clone, Default)]
pub(crate) struct PassTable {
    next_id: u64,
    records: BTreeMap<PassId, SubscriptionPass>,
    by_plate: HashMap<String, PassId>,
}

/// Serialized form of a table.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub version: u32,
    pub next_id: u64,
    pub records: Vec<SubscriptionPass>,
}

impl PassTable {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn find_by_plate(&self, plate: &str) -> Option<&SubscriptionPass> {
        self.by_plate
            .get(plate.trim())
            .and_then(|id| self.records.get(id))
    }

    pub fn get(&self, id: PassId) -> Option<&SubscriptionPass> {
        self.records.get(&id)
    }

    pub fn insert(&mut self, new: NewPass) -> StoreResult<SubscriptionPass> {
        let id = PassId::new(self.next_id);
        let pass = new.into_pass(id);
        validate(&pass)?;

        if self.by_plate.contains_key(&pass.plate) {
            return Err(StoreError::DuplicatePlate { plate: pass.plate });
        }

        self.next_id += 1;
        self.by_plate.insert(pass.plate.clone(), id);
        self.records.insert(id, pass.clone());
        Ok(pass)
    }

    pub fn apply(&mut self, id: PassId, patch: &PassPatch) -> StoreResult<SubscriptionPass> {
        let current = self.records.get(&id).ok_or(StoreError::NotFound { id })?;

        let mut updated = current.clone();
        patch.apply_to(&mut updated);
        validate(&updated)?;

        let old_plate = current.plate.clone();
        if updated.plate != old_plate {
            if self.by_plate.contains_key(&updated.plate) {
                return Err(StoreError::DuplicatePlate {
                    plate: updated.plate,
                });
            }
            self.by_plate.remove(&old_plate);
            self.by_plate.insert(updated.plate.clone(), id);
        }

        self.records.insert(id, updated.clone());
        Ok(updated)
    }

    pub fn list(&self, filter: &PassFilter) -> Vec<SubscriptionPass> {
        self.records
            .values()
            .filter(|pass| filter.matches(pass))
            .cloned()
            .collect()
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            next_id: self.next_id,
            records: self.records.values().cloned().collect(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> StoreResult<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Corrupted(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut table = Self::new();
        table.next_id = snapshot.next_id.max(1);

        for pass in snapshot.records {
            validate(&pass).map_err(|e| StoreError::Corrupted(format!("record {}: {e}", pass.id)))?;
            if pass.id.as_u64() >= table.next_id {
                return Err(StoreError::Corrupted(format!(
                    "record id {} not below next id {}",
                    pass.id, table.next_id
                )));
            }
            if table.by_plate.insert(pass.plate.clone(), pass.id).is_some() {
                return Err(StoreError::Corrupted(format!(
                    "plate {} appears twice",
                    pass.plate
                )));
            }
            if table.records.insert(pass.id, pass).is_some() {
                return Err(StoreError::Corrupted("duplicate record id".into()));
            }
        }

        Ok(table)
    }
}

fn validate(pass: &SubscriptionPass) -> StoreResult<()> {
    if pass.plate.trim().is_empty() {
        return Err(StoreError::invalid("plate", "must not be empty"));
    }
    if pass.balance < 0 {
        return Err(StoreError::invalid(
            "balance",
            format!("must not be negative (got {})", pass.balance),
        ));
    }
    if pass.cost_per_passage <= 0 {
        return Err(StoreError::invalid(
            "cost_per_passage",
            format!("must be positive (got {})", pass.cost_per_passage),
        ));
    }
    Ok(())
}
