use crate::config::RunConfig;
use crate::error::{ConfigurationError, WarmUpError};
use crate::progress::{ProgressSink, ops_per_sec};
use crate::selector::{WeightSpec, WeightedOperationSelector};
use crate::stats::StatsSnapshot;
use crate::worker::{RunContext, Worker, WorkerReport, WorkerSlot, latency_histogram};
use anyhow::{Result, bail};
use hdrhistogram::Histogram;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thousands::Separable;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    WarmingUp,
    /// Warm-up barrier passed; the timed phase has not started.
    WarmedUp,
    Running,
    Completed,
}

#[derive(Debug)]
pub struct WarmUpSummary {
    pub created: u64,
    /// Tasks that stopped before creating all their files.
    pub stopped_tasks: usize,
    pub elapsed: Duration,
}

impl Display for WarmUpSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== WARM-UP ===")?;
        write!(
            f,
            "files: {} | stopped tasks: {} | time: {:.1?} | throughput: {} ops/s",
            self.created.separate_with_underscores(),
            self.stopped_tasks,
            self.elapsed,
            (ops_per_sec(self.created, self.elapsed) as u64).separate_with_underscores()
        )
    }
}

#[derive(Debug)]
pub struct RunResult {
    pub elapsed: Duration,
    pub completed: u64,
    pub failed: u64,
    pub throughput_per_sec: f64,
    /// Iterations the path provider had no path for.
    pub skipped: u64,
    pub stats: StatsSnapshot,
    pub latency_micros: Histogram<u64>,
}

impl RunResult {
    pub fn elapsed_millis(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

impl Display for RunResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let percentile = |q: f64| -> String {
            if self.latency_micros.is_empty() {
                "-".into()
            } else {
                self.latency_micros
                    .value_at_quantile(q)
                    .separate_with_underscores()
            }
        };

        writeln!(f, "=== RUN ===")?;
        writeln!(
            f,
            "completed: {} | failed: {} | skipped: {} | time: {:.1?} | throughput: {} ops/s",
            self.completed.separate_with_underscores(),
            self.failed.separate_with_underscores(),
            self.skipped.separate_with_underscores(),
            self.elapsed,
            (self.throughput_per_sec as u64).separate_with_underscores()
        )?;
        writeln!(
            f,
            "p50: {} µs | p95: {} µs | p99: {} µs | p99.9: {} µs",
            percentile(0.50),
            percentile(0.95),
            percentile(0.99),
            percentile(0.999)
        )?;
        write!(f, "=== OPERATIONS ===")?;
        for (kind, attempted) in self.stats.seen_kinds() {
            write!(
                f,
                "\n{kind}: {} ({:.2}%)",
                attempted.separate_with_underscores(),
                self.stats.percent_of_completed(kind)
            )?;
        }
        Ok(())
    }
}

/// Runs the warm-up barrier and then the timed mixed-operation phase over a
/// fixed set of worker slots.
pub struct BenchmarkDriver {
    config: RunConfig,
    weights: WeightSpec,
    slots: Vec<WorkerSlot>,
    sink: Arc<dyn ProgressSink>,
    seed: Option<u64>,
    state: DriverState,
}

impl BenchmarkDriver {
    /// Fails on any misconfiguration, so nothing is started with a bad setup.
    pub fn new(
        config: RunConfig,
        weights: WeightSpec,
        slots: Vec<WorkerSlot>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        weights.validate()?;
        if slots.len() != config.concurrency {
            return Err(ConfigurationError::SlotCountMismatch {
                expected: config.concurrency,
                actual: slots.len(),
            });
        }
        Ok(BenchmarkDriver {
            config,
            weights,
            slots,
            sink,
            seed: None,
            state: DriverState::Idle,
        })
    }

    /// Seeds worker `i`'s selector with `seed + i` instead of entropy.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Every slot creates `files_per_worker` files in parallel. Blocks until all
    /// tasks are done; a failing task is logged and stops early.
    pub fn warm_up(&mut self) -> Result<WarmUpSummary> {
        if self.state != DriverState::Idle {
            bail!("warm-up must run before the timed phase");
        }
        self.state = DriverState::WarmingUp;
        info!(
            "warming up: {} workers x {} files",
            self.slots.len(),
            self.config.files_per_worker
        );

        let start = Instant::now();
        let config = &self.config;
        let outcomes: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .slots
                .iter_mut()
                .enumerate()
                .map(|(id, slot)| s.spawn(move || warm_up_task(id, slot, config)))
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut summary = WarmUpSummary {
            created: 0,
            stopped_tasks: 0,
            elapsed: start.elapsed(),
        };
        for (id, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(report) => {
                    summary.created += report.created;
                    if report.stopped {
                        summary.stopped_tasks += 1;
                    }
                }
                Err(_) => {
                    error!("warm-up task {id} panicked");
                    summary.stopped_tasks += 1;
                }
            }
        }
        self.state = DriverState::WarmedUp;
        info!("warm-up done: {} files in {:.1?}", summary.created, summary.elapsed);
        Ok(summary)
    }

    /// Starts one worker per slot, joins them all and reports on the run.
    pub fn run(&mut self) -> Result<RunResult> {
        if matches!(self.state, DriverState::Running | DriverState::Completed) {
            bail!("the timed phase of a driver runs only once");
        }
        self.state = DriverState::Running;

        let selectors = (0..self.slots.len())
            .map(|i| match self.seed {
                Some(seed) => {
                    WeightedOperationSelector::with_seed(&self.weights, seed.wrapping_add(i as u64))
                }
                None => WeightedOperationSelector::new(&self.weights),
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "running {} workers for {:?}",
            self.slots.len(),
            self.config.duration
        );
        let ctx = RunContext::new(self.config.clone(), self.sink.clone(), Instant::now());
        let ctx_ref = &ctx;
        let outcomes: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .slots
                .iter_mut()
                .zip(selectors)
                .enumerate()
                .map(|(id, (slot, selector))| {
                    s.spawn(move || -> Result<WorkerReport> {
                        Ok(Worker::new(id, ctx_ref, slot, selector)?.run()?)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });
        let elapsed = ctx.start.elapsed();
        self.state = DriverState::Completed;

        let mut latency_micros = latency_histogram()?;
        let mut skipped = 0;
        for (id, outcome) in outcomes.into_iter().enumerate() {
            let report = match outcome {
                Ok(report) => report?,
                Err(_) => bail!("worker {id} panicked"),
            };
            latency_micros.add(&report.latency_micros)?;
            skipped += report.skipped;
        }

        let stats = ctx.stats.snapshot();
        Ok(RunResult {
            elapsed,
            completed: stats.completed,
            failed: stats.failed,
            throughput_per_sec: ops_per_sec(stats.completed, elapsed),
            skipped,
            stats,
            latency_micros,
        })
    }
}

struct WarmUpReport {
    created: u64,
    stopped: bool,
}

fn warm_up_task(id: usize, slot: &mut WorkerSlot, config: &RunConfig) -> WarmUpReport {
    let mut created = 0;
    for _ in 0..config.files_per_worker {
        if let Err(e) = create_and_verify(slot, config) {
            warn!(
                "warm-up task {id} stopped after {created} files: {:#}",
                anyhow::Error::new(e)
            );
            return WarmUpReport {
                created,
                stopped: true,
            };
        }
        created += 1;
    }
    WarmUpReport {
        created,
        stopped: false,
    }
}

fn create_and_verify(slot: &mut WorkerSlot, config: &RunConfig) -> Result<(), WarmUpError> {
    let path = slot
        .provider
        .path_for_create()
        .ok_or(WarmUpError::PathUnavailable)?;
    slot.client
        .create(&path, config.replication, config.file_size)
        .map_err(|source| WarmUpError::Create {
            path: path.clone(),
            source,
        })?;
    slot.provider.on_create_succeeded(&path);
    slot.client
        .read(&path, config.file_size)
        .map_err(|source| WarmUpError::Read { path, source })
}
