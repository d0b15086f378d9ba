//! Per-plate mutual exclusion.
//!
//! Debit, push and pull-upsert of the same plate never interleave; work on
//! different plates runs in parallel. A guard may cover several plates
//! (a rename touches both the old and the new one); all of them are taken
//! at once, so two multi-plate guards cannot deadlock each other.

use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::fmt;

/// Registry of plates currently held.
#[derive(Default)]
pub struct PlateLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl PlateLocks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `plate` is free, then holds it until the guard drops.
    pub fn lock(&self, plate: &str) -> PlateGuard<'_> {
        self.lock_all(&[plate])
    }

    /// Blocks until every plate in `plates` is free, then holds them all.
    pub fn lock_all(&self, plates: &[&str]) -> PlateGuard<'_> {
        let mut keys: Vec<String> = plates.iter().map(|p| normalize(p)).collect();
        keys.sort();
        keys.dedup();

        let mut held = self.held.lock();
        while keys.iter().any(|key| held.contains(key)) {
            self.released.wait(&mut held);
        }
        held.extend(keys.iter().cloned());

        PlateGuard { locks: self, keys }
    }

    /// Returns true if `plate` is currently held.
    pub fn is_held(&self, plate: &str) -> bool {
        self.held.lock().contains(&normalize(plate))
    }
}

impl fmt::Debug for PlateLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlateLocks")
            .field("held", &self.held.lock().len())
            .finish()
    }
}

fn normalize(plate: &str) -> String {
    plate.trim().to_string()
}

/// Holds one or more plates; releases them on drop.
#[must_use = "the plates are released as soon as the guard is dropped"]
pub struct PlateGuard<'a> {
    locks: &'a PlateLocks,
    keys: Vec<String>,
}

impl PlateGuard<'_> {
    /// Plates covered by this guard, sorted.
    pub fn plates(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for PlateGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock();
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

impl fmt::Debug for PlateGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PlateGuard").field(&self.keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn guard_releases_on_drop() {
        let locks = PlateLocks::new();
        {
            let guard = locks.lock(" GA-1 ");
            assert!(locks.is_held("GA-1"));
            assert_eq!(guard.plates(), ["GA-1".to_string()]);
        }
        assert!(!locks.is_held("GA-1"));
    }

    #[test]
    fn lock_all_dedups_and_sorts() {
        let locks = PlateLocks::new();
        let guard = locks.lock_all(&["ZZ-9", "AA-1", "ZZ-9"]);
        assert_eq!(guard.plates(), ["AA-1".to_string(), "ZZ-9".to_string()]);
    }

    #[test]
    fn different_plates_do_not_block() {
        let locks = PlateLocks::new();
        let _a = locks.lock("GA-1");
        let _b = locks.lock("GA-2");
        assert!(locks.is_held("GA-1") && locks.is_held("GA-2"));
    }

    #[test]
    fn same_plate_is_exclusive() {
        let locks = Arc::new(PlateLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = locks.lock("GA-1");
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn crossed_multi_plate_guards_do_not_deadlock() {
        let locks = Arc::new(PlateLocks::new());
        let handles: Vec<_> = [["A", "B"], ["B", "A"]]
            .into_iter()
            .map(|plates| {
                let locks = Arc::clone(&locks);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let _guard = locks.lock_all(&plates);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!locks.is_held("A"));
    }
}
