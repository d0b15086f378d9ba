//! Property tests for ledger and sync invariants.

use proptest::prelude::*;
use tollpass_remote::Operation;
use tollpass_store::{LocalStore, NewPass, Origin, PassFilter, RemoteRef};
use tollpass_sync::{LedgerError, PassUpdate, PushOutcome, SyncConfig};
use tollpass_testkit::prelude::*;

fn offline() -> SyncConfig {
    SyncConfig::default().with_auto_push(false)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn balance_never_goes_negative(
        pass in local_pass_strategy(),
        ops in ledger_ops_strategy(40),
    ) {
        let harness = TestLedger::with_config(offline());
        let plate = harness.local_pass(pass).plate;

        for op in ops {
            let before = harness.pass(&plate);
            match op {
                LedgerOp::SetCost(cost) => {
                    harness
                        .ledger
                        .update_pass(&plate, PassUpdate::new().cost_per_passage(cost))
                        .unwrap();
                    prop_assert_eq!(harness.pass(&plate).balance, before.balance);
                }
                LedgerOp::Passage | LedgerOp::Debit(_) => {
                    let amount = match op {
                        LedgerOp::Debit(amount) => Some(amount),
                        _ => None,
                    };
                    let effective = amount.unwrap_or(before.cost_per_passage);
                    match harness.ledger.debit(&plate, amount) {
                        Ok(receipt) => {
                            prop_assert!(effective > 0 && effective <= before.balance);
                            prop_assert_eq!(receipt.value.balance(), before.balance - effective);
                        }
                        Err(LedgerError::InsufficientBalance { balance, amount, .. }) => {
                            prop_assert_eq!(balance, before.balance);
                            prop_assert!(amount > before.balance);
                            prop_assert_eq!(harness.pass(&plate).balance, before.balance);
                        }
                        Err(LedgerError::InvalidAmount(amount)) => {
                            prop_assert!(amount <= 0);
                            prop_assert_eq!(harness.pass(&plate).balance, before.balance);
                        }
                        Err(other) => prop_assert!(false, "unexpected error: {}", other),
                    }
                }
            }
            prop_assert!(harness.pass(&plate).balance >= 0);
        }
    }

    #[test]
    fn remote_origin_passes_cause_no_calls(
        passes in prop::collection::vec(local_pass_strategy(), 1..8),
    ) {
        let harness = TestLedger::with_config(
            SyncConfig::default().with_staleness(std::time::Duration::ZERO),
        );
        for (i, pass) in passes.into_iter().enumerate() {
            let new = NewPass::from_remote(
                RemoteRef::new(i as i64 + 1),
                pass.plate,
                pass.holder_name,
                pass.vehicle_class,
                pass.balance,
                chrono::Utc::now(),
            );
            // Generated plates may collide; skip duplicates.
            let _ = harness.store.create(new);
        }

        for pass in harness.ledger.list(&PassFilter::all()).unwrap() {
            prop_assert_eq!(pass.origin, Origin::Remote);
            prop_assert_eq!(harness.engine.push_one(&pass).unwrap(), PushOutcome::Suppressed);
        }
        let report = harness.engine.push_pending().unwrap();
        prop_assert_eq!(report.attempted, 0);
        prop_assert!(harness.remote.calls().is_empty());
        prop_assert_eq!(harness.remote.login_count(), 0);
    }

    #[test]
    fn repeated_pulls_converge(
        balances in prop::collection::vec(balance_strategy(), 1..6),
        pulls in 1usize..4,
    ) {
        let harness = TestLedger::new();
        for (i, balance) in balances.iter().enumerate() {
            harness.remote_pass(&format!("GA-{i}"), "Awa", *balance);
        }

        for _ in 0..pulls {
            harness.engine.pull_all().unwrap();
        }

        prop_assert_eq!(harness.remote.call_count(Operation::Write), 0);
        for (i, balance) in balances.iter().enumerate() {
            let pass = harness.pass(&format!("GA-{i}"));
            prop_assert_eq!(pass.balance, *balance);
            prop_assert_eq!(pass.holder_name.as_str(), "[DISTANT] Awa");
            prop_assert_eq!(pass.cost_per_passage, 500);
        }
    }
}
