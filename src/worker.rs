use crate::config::RunConfig;
use crate::error::ConfigurationError;
use crate::operation::OperationKind;
use crate::pool::PathProvider;
use crate::progress::{LogGate, ProgressSink, format_progress};
use crate::selector::WeightedOperationSelector;
use crate::stats::RunStats;
use crate::storage::{StorageClient, StorageError};
use anyhow::Result;
use hdrhistogram::Histogram;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Collaborators owned by one worker slot for the whole benchmark.
pub struct WorkerSlot {
    pub client: Box<dyn StorageClient>,
    pub provider: Box<dyn PathProvider>,
}

impl WorkerSlot {
    pub fn new(client: Box<dyn StorageClient>, provider: Box<dyn PathProvider>) -> Self {
        WorkerSlot { client, provider }
    }
}

/// State shared read-only (apart from the counters) by every worker of a run.
pub struct RunContext {
    pub config: RunConfig,
    pub stats: RunStats,
    pub gate: LogGate,
    pub sink: Arc<dyn ProgressSink>,
    pub start: Instant,
    pub deadline: Instant,
}

impl RunContext {
    pub fn new(config: RunConfig, sink: Arc<dyn ProgressSink>, start: Instant) -> Self {
        RunContext {
            deadline: start + config.duration,
            gate: LogGate::new(config.progress_interval),
            stats: RunStats::new(),
            config,
            sink,
            start,
        }
    }
}

pub(crate) fn latency_histogram() -> Result<Histogram<u64>> {
    Ok(Histogram::new_with_bounds(1, 10_000_000, 3)?)
}

#[derive(Debug)]
pub struct WorkerReport {
    /// Operations handed to the storage client, successful or not.
    pub attempted: u64,
    /// Iterations dropped because the provider had no path.
    pub skipped: u64,
    /// Latency of successful operations.
    pub latency_micros: Histogram<u64>,
}

/// One operation with the paths it needs, resolved before it is timed.
enum Planned {
    Create(String),
    Append(String),
    Read(String),
    Rename { from: String, to: String },
    Delete(String),
    ListFile(String),
    ListDir(String),
    ChmodFile(String),
    ChmodDir(String),
    Mkdir(String),
    SetReplication(String),
    StatFile(String),
    StatDir(String),
}

impl Planned {
    fn path(&self) -> &str {
        match self {
            Planned::Rename { from, .. } => from,
            Planned::Create(path)
            | Planned::Append(path)
            | Planned::Read(path)
            | Planned::Delete(path)
            | Planned::ListFile(path)
            | Planned::ListDir(path)
            | Planned::ChmodFile(path)
            | Planned::ChmodDir(path)
            | Planned::Mkdir(path)
            | Planned::SetReplication(path)
            | Planned::StatFile(path)
            | Planned::StatDir(path) => path,
        }
    }
}

pub struct Worker<'a> {
    id: usize,
    ctx: &'a RunContext,
    slot: &'a mut WorkerSlot,
    selector: WeightedOperationSelector,
    report: WorkerReport,
}

impl<'a> Worker<'a> {
    pub fn new(
        id: usize,
        ctx: &'a RunContext,
        slot: &'a mut WorkerSlot,
        selector: WeightedOperationSelector,
    ) -> Result<Self> {
        Ok(Worker {
            id,
            ctx,
            slot,
            selector,
            report: WorkerReport {
                attempted: 0,
                skipped: 0,
                latency_micros: latency_histogram()?,
            },
        })
    }

    /// Loops until the run deadline. Storage and path errors are counted and
    /// logged here; only a selector misconfiguration is returned.
    pub fn run(mut self) -> Result<WorkerReport, ConfigurationError> {
        while Instant::now() < self.ctx.deadline {
            let kind = self.selector.select()?;
            self.perform(kind);
            self.log_progress();
        }
        debug!(
            "worker {} done: {} attempted, {} skipped",
            self.id, self.report.attempted, self.report.skipped
        );
        Ok(self.report)
    }

    fn perform(&mut self, kind: OperationKind) {
        let Some(planned) = self.plan(kind) else {
            debug!(
                "worker {}: could not perform {kind}, no path from the file pool",
                self.id
            );
            self.report.skipped += 1;
            return;
        };

        self.report.attempted += 1;
        let started = Instant::now();
        match self.execute(&planned) {
            Ok(()) => {
                let micros = started.elapsed().as_micros() as u64;
                self.report.latency_micros.saturating_record(micros.max(1));
                self.ctx.stats.record_attempt(kind, true);
            }
            Err(e) => {
                warn!("worker {}: {kind} {} failed: {e}", self.id, planned.path());
                self.ctx.stats.record_attempt(kind, false);
            }
        }
    }

    fn plan(&mut self, kind: OperationKind) -> Option<Planned> {
        let provider = &mut self.slot.provider;
        let planned = match kind {
            OperationKind::Create => Planned::Create(provider.path_for_create()?),
            OperationKind::Append => Planned::Append(provider.path_for_existing(kind)?),
            OperationKind::Read => Planned::Read(provider.path_for_existing(kind)?),
            OperationKind::Rename => {
                let from = provider.path_for_existing(kind)?;
                let to = provider.rename_target(&from)?;
                Planned::Rename { from, to }
            }
            OperationKind::Delete => Planned::Delete(provider.path_for_existing(kind)?),
            OperationKind::ListFile => Planned::ListFile(provider.path_for_existing(kind)?),
            OperationKind::ListDir => Planned::ListDir(provider.path_for_existing(kind)?),
            OperationKind::ChmodFile => Planned::ChmodFile(provider.path_for_existing(kind)?),
            OperationKind::ChmodDir => Planned::ChmodDir(provider.path_for_existing(kind)?),
            OperationKind::Mkdir => Planned::Mkdir(provider.path_for_mkdir()?),
            OperationKind::SetReplication => {
                Planned::SetReplication(provider.path_for_existing(kind)?)
            }
            OperationKind::StatFile => Planned::StatFile(provider.path_for_existing(kind)?),
            OperationKind::StatDir => Planned::StatDir(provider.path_for_existing(kind)?),
        };
        Some(planned)
    }

    fn execute(&mut self, planned: &Planned) -> Result<(), StorageError> {
        let cfg = &self.ctx.config;
        let WorkerSlot { client, provider } = &mut *self.slot;
        match planned {
            Planned::Create(path) => {
                client.create(path, cfg.replication, cfg.file_size)?;
                provider.on_create_succeeded(path);
            }
            Planned::Append(path) => client.append(path, cfg.append_size)?,
            Planned::Read(path) => client.read(path, cfg.file_size)?,
            Planned::Rename { from, to } => {
                client.rename(from, to)?;
                provider.on_rename_succeeded(from, to);
            }
            Planned::Delete(path) => {
                client.delete(path)?;
                provider.on_delete_succeeded(path);
            }
            Planned::ListFile(path) => client.list_file(path)?,
            Planned::ListDir(path) => client.list_dir(path)?,
            Planned::ChmodFile(path) => client.chmod_file(path)?,
            Planned::ChmodDir(path) => client.chmod_dir(path)?,
            Planned::Mkdir(path) => {
                client.mkdir(path)?;
                provider.on_mkdir_succeeded(path);
            }
            Planned::SetReplication(path) => client.set_replication(path, cfg.replication)?,
            Planned::StatFile(path) => client.stat_file(path)?,
            Planned::StatDir(path) => client.stat_dir(path)?,
        }
        Ok(())
    }

    fn log_progress(&self) {
        if self.ctx.gate.try_acquire() {
            let line = format_progress(&self.ctx.stats.snapshot(), self.ctx.start.elapsed());
            self.ctx.sink.emit(&line);
        }
    }
}
