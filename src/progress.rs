use crate::stats::StatsSnapshot;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thousands::Separable;
use tracing::info;

/// Destination for progress lines. The workers decide content and cadence.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, line: &str);
}

pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, line: &str) {
        info!(target: "fsbencher::progress", "{line}");
    }
}

pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn emit(&self, line: &str) {
        println!("{line}");
    }
}

pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _line: &str) {}
}

/// Lets at most one caller through per interval, across all workers.
pub struct LogGate {
    origin: Instant,
    interval_ms: u64,
    last_ms: AtomicU64,
}

impl LogGate {
    pub fn new(interval: Duration) -> Self {
        LogGate {
            origin: Instant::now(),
            interval_ms: interval.as_millis() as u64,
            last_ms: AtomicU64::new(0),
        }
    }

    pub fn try_acquire(&self) -> bool {
        let now = self.origin.elapsed().as_millis() as u64;
        let last = self.last_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.interval_ms {
            return false;
        }
        self.last_ms
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }
}

pub fn ops_per_sec(ops: u64, elapsed: Duration) -> f64 {
    if ops == 0 || elapsed.is_zero() {
        0.0
    } else {
        ops as f64 / elapsed.as_secs_f64()
    }
}

/// `Completed Ops: .. Failed Ops: .. Speed: .. ops/s` followed by each
/// attempted kind's share of completed operations.
pub fn format_progress(snap: &StatsSnapshot, elapsed: Duration) -> String {
    let mut line = String::new();
    let _ = write!(
        line,
        "{:<25}{:<20}{:<22}",
        format!("Completed Ops: {} ", snap.completed.separate_with_underscores()),
        format!("Failed Ops: {} ", snap.failed.separate_with_underscores()),
        format!("Speed: {:.2} ops/s ", ops_per_sec(snap.completed, elapsed)),
    );
    for (kind, _) in snap.seen_kinds() {
        let cell = format!("{kind}: [{:.2}] ", snap.percent_of_completed(kind));
        let _ = write!(line, "{:<width$}", cell, width = kind.name().len() + 10);
    }
    line.trim_end().to_owned()
}
