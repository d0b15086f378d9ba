//! Property-based test generators using proptest.
//!
//! Provides strategies for generating passes and ledger operations that
//! respect the record invariants.

use proptest::prelude::*;
use tollpass_store::{NewPass, VehicleClass};

/// Strategy for generating plates such as `AB-123-CD`.
pub fn plate_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z]{2}-[0-9]{3}-[A-Z]{2}").expect("Invalid regex")
}

/// Strategy for generating holder names.
pub fn holder_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,12}( [A-Z][a-z]{1,12})?").expect("Invalid regex")
}

/// Strategy for generating any vehicle class.
pub fn vehicle_class_strategy() -> impl Strategy<Value = VehicleClass> {
    prop::sample::select(VehicleClass::ALL.to_vec())
}

/// Strategy for generating balances in minor units.
pub fn balance_strategy() -> impl Strategy<Value = i64> {
    0i64..20_000
}

/// Strategy for generating costs per passage.
pub fn cost_strategy() -> impl Strategy<Value = i64> {
    1i64..2_000
}

/// Strategy for generating valid locally authored passes.
pub fn local_pass_strategy() -> impl Strategy<Value = NewPass> {
    (
        plate_strategy(),
        holder_name_strategy(),
        vehicle_class_strategy(),
        balance_strategy(),
        cost_strategy(),
    )
        .prop_map(|(plate, name, class, balance, cost)| {
            NewPass::local(plate, name, class, balance).with_cost_per_passage(cost)
        })
}

/// One step of a ledger workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    /// Debit one passage at the configured cost.
    Passage,
    /// Debit an explicit amount, which may be invalid.
    Debit(i64),
    /// Change the cost per passage.
    SetCost(i64),
}

/// Strategy for generating a single ledger step.
pub fn ledger_op_strategy() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        3 => Just(LedgerOp::Passage),
        3 => (-100i64..3_000).prop_map(LedgerOp::Debit),
        1 => cost_strategy().prop_map(LedgerOp::SetCost),
    ]
}

/// Strategy for generating ledger workloads.
pub fn ledger_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
    prop::collection::vec(ledger_op_strategy(), 0..max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_plates_are_trimmed_and_non_empty(plate in plate_strategy()) {
            prop_assert_eq!(plate.trim(), plate.as_str());
            prop_assert_eq!(plate.len(), 9);
        }

        #[test]
        fn generated_passes_are_valid(pass in local_pass_strategy()) {
            prop_assert!(pass.balance >= 0);
            prop_assert!(pass.cost_per_passage > 0);
            prop_assert!(pass.pending_push);
        }
    }
}
