//! Local store trait definition.

use crate::error::StoreResult;
use crate::filter::PassFilter;
use crate::types::{NewPass, PassId, PassPatch, SubscriptionPass};

/// The local persistence collaborator of the ledger.
///
/// # Invariants
///
/// - `plate` is unique among stored records at any instant
/// - Every mutation is atomic for the single record it touches
/// - A rejected mutation leaves the store exactly as it was
/// - No cross-record transactions are offered
/// - Stores must be `Send + Sync`; callers serialize per-plate work themselves
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent ledgers
pub trait LocalStore: Send + Sync {
    /// Looks up a record by plate.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_by_plate(&self, plate: &str) -> StoreResult<Option<SubscriptionPass>>;

    /// Looks up a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, id: PassId) -> StoreResult<Option<SubscriptionPass>>;

    /// Creates a record and assigns it a fresh id.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The plate is already registered
    /// - A field violates a record invariant
    /// - The change cannot be persisted
    fn create(&self, pass: NewPass) -> StoreResult<SubscriptionPass>;

    /// Applies `patch` to the record with `id` and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No record has this id
    /// - The new plate collides with another record
    /// - A field violates a record invariant
    /// - The change cannot be persisted
    fn update(&self, id: PassId, patch: &PassPatch) -> StoreResult<SubscriptionPass>;

    /// Returns every record matching `filter`, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self, filter: &PassFilter) -> StoreResult<Vec<SubscriptionPass>>;
}
