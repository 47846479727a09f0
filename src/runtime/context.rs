//! Per-build construction state.

use serde::Serialize;
use std::cell::Cell;

/// Counters describing one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Objects returned by construction procedures.
    pub constructed: usize,
    /// Deferred nodes whose initialization has been finalized.
    pub finalized: usize,
    /// Parameters that took a random seed.
    pub randomized: usize,
}

/// State threaded through every construction procedure of one build.
///
/// Holds the random seed counter (so that two randomized parameters never receive the
/// same seed) and the counter used to name anonymous nodes.
#[derive(Debug)]
pub struct BuildContext {
    next_seed: Cell<u64>,
    seed_offset: u64,
    next_anonymous: Cell<usize>,
    stats: Cell<BuildStats>,
}

impl BuildContext {
    pub fn new(seed_offset: u64) -> Self {
        Self {
            next_seed: Cell::new(1),
            seed_offset,
            next_anonymous: Cell::new(1),
            stats: Cell::new(BuildStats::default()),
        }
    }

    /// Seed for the next randomized initialization; advances on every call.
    ///
    /// Seeds wrap around `u64::MAX`, so any offset is valid.
    pub fn next_random_seed(&self) -> u64 {
        let seed = self.next_seed.get();
        self.next_seed.set(seed.wrapping_add(1));
        self.update(|s| s.randomized += 1);
        seed.wrapping_add(self.seed_offset)
    }

    /// Name for a new node: its binding path if it has one, a generated one otherwise.
    ///
    /// Generated names contain `#`, which identifiers cannot, so they never collide with
    /// user-given names.
    pub fn node_name(&self, hint: Option<&str>, kind: &str) -> String {
        match hint {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => {
                let n = self.next_anonymous.get();
                self.next_anonymous.set(n + 1);
                format!("{}#{}", kind, n)
            }
        }
    }

    pub fn stats(&self) -> BuildStats {
        self.stats.get()
    }

    pub(crate) fn record_constructed(&self) {
        self.update(|s| s.constructed += 1);
    }

    pub(crate) fn record_finalized(&self) {
        self.update(|s| s.finalized += 1);
    }

    fn update(&self, f: impl FnOnce(&mut BuildStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(0)
    }
}
