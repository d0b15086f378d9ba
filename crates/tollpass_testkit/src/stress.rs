//! Concurrent ledger workloads.
//!
//! These helpers start many debits at the same instant to exercise the
//! per-plate serialization.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tollpass_remote::RemoteLink;
use tollpass_store::LocalStore;
use tollpass_sync::{LedgerError, PassLedger};

/// Outcome of a concurrent debit run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebitRace {
    /// Debits that committed.
    pub committed: usize,
    /// Debits refused for insufficient balance.
    pub insufficient: usize,
    /// Debits that failed otherwise.
    pub failed: usize,
    /// Balances reported by committed debits, in completion order.
    pub balances: Vec<i64>,
    /// Wall time of the run.
    pub duration: Duration,
}

impl DebitRace {
    /// Total debits attempted.
    pub fn total(&self) -> usize {
        self.committed + self.insufficient + self.failed
    }
}

/// Runs `threads` debits of `amount` (one passage if `None`) on `plate`,
/// all released at once.
pub fn race_debits<S, L>(
    ledger: &Arc<PassLedger<S, L>>,
    plate: &str,
    threads: usize,
    amount: Option<i64>,
) -> DebitRace
where
    S: LocalStore + 'static,
    L: RemoteLink + 'static,
{
    let barrier = Arc::new(Barrier::new(threads));
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let ledger = Arc::clone(ledger);
            let barrier = Arc::clone(&barrier);
            let plate = plate.to_string();
            thread::spawn(move || {
                barrier.wait();
                ledger
                    .debit(&plate, amount)
                    .map(|committed| committed.value.balance())
            })
        })
        .collect();

    let mut race = DebitRace::default();
    for handle in handles {
        match handle.join().expect("debit thread panicked") {
            Ok(balance) => {
                race.committed += 1;
                race.balances.push(balance);
            }
            Err(LedgerError::InsufficientBalance { .. }) => race.insufficient += 1,
            Err(_) => race.failed += 1,
        }
    }
    race.duration = start.elapsed();
    race
}

/// Runs `per_plate` debits of `amount` on every plate, one thread per plate.
///
/// Returns the committed count per plate, in `plates` order.
pub fn debit_many_plates<S, L>(
    ledger: &Arc<PassLedger<S, L>>,
    plates: &[String],
    per_plate: usize,
    amount: i64,
) -> Vec<usize>
where
    S: LocalStore + 'static,
    L: RemoteLink + 'static,
{
    let barrier = Arc::new(Barrier::new(plates.len()));
    let handles: Vec<_> = plates
        .iter()
        .cloned()
        .map(|plate| {
            let ledger = Arc::clone(ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..per_plate)
                    .filter(|_| ledger.debit(&plate, Some(amount)).is_ok())
                    .count()
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().expect("debit thread panicked"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestLedger;
    use tollpass_store::{NewPass, VehicleClass};
    use tollpass_sync::SyncConfig;

    #[test]
    fn race_on_one_plate_never_overdraws() {
        let harness = TestLedger::with_config(SyncConfig::default().with_auto_push(false));
        harness.local_pass(NewPass::local("GA-1", "Awa", VehicleClass::Car, 2_000));
        let ledger = Arc::new(harness.ledger);

        let race = race_debits(&ledger, "GA-1", 8, Some(500));
        assert_eq!(race.total(), 8);
        assert_eq!(race.committed, 4);
        assert_eq!(race.insufficient, 4);
        assert_eq!(ledger.get("GA-1").unwrap().balance, 0);
    }

    #[test]
    fn plates_do_not_interfere() {
        let harness = TestLedger::with_config(SyncConfig::default().with_auto_push(false));
        let plates: Vec<String> = (0..4).map(|i| format!("GA-{i}")).collect();
        for plate in &plates {
            harness.local_pass(NewPass::local(plate.as_str(), "Awa", VehicleClass::Car, 1_000));
        }
        let ledger = Arc::new(harness.ledger);

        let committed = debit_many_plates(&ledger, &plates, 15, 100);
        assert_eq!(committed, vec![10; 4]);
    }
}
