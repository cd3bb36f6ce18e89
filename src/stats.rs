use crate::operation::OperationKind;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every worker of one run.
///
/// The per-kind counters live in a fixed array indexed by [`OperationKind`],
/// so there is no lazily created entry to race on and no increment is lost.
#[derive(Debug)]
pub struct RunStats {
    completed: AtomicU64,
    failed: AtomicU64,
    per_kind: [AtomicU64; OperationKind::COUNT],
}

impl Default for RunStats {
    fn default() -> Self {
        RunStats {
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            per_kind: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self, kind: OperationKind, success: bool) {
        self.per_kind[kind.index()].fetch_add(1, Ordering::Relaxed);
        if success {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Reads every counter once. Counters are read independently, so a snapshot
    /// taken while workers run may be off by the few increments in flight.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completed: self.completed(),
            failed: self.failed(),
            per_kind: std::array::from_fn(|i| self.per_kind[i].load(Ordering::Relaxed)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub per_kind: [u64; OperationKind::COUNT],
}

impl StatsSnapshot {
    pub fn attempted(&self, kind: OperationKind) -> u64 {
        self.per_kind[kind.index()]
    }

    pub fn total_attempted(&self) -> u64 {
        self.completed + self.failed
    }

    /// Kinds attempted at least once, in reporting order.
    pub fn seen_kinds(&self) -> impl Iterator<Item = (OperationKind, u64)> + '_ {
        OperationKind::ALL
            .iter()
            .map(|k| (*k, self.attempted(*k)))
            .filter(|(_, n)| *n > 0)
    }

    /// Attempts of `kind` as a percentage of completed operations.
    pub fn percent_of_completed(&self, kind: OperationKind) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.attempted(kind) as f64 / self.completed as f64 * 100.0
        }
    }
}
