//! Time-bounded, weighted filesystem-operation benchmark.
//!
//! A [`BenchmarkDriver`] warms a namespace up with files, then runs one
//! [`Worker`] per slot until a deadline. Each worker draws operations from a
//! [`WeightedOperationSelector`], takes paths from its [`PathProvider`] and
//! issues them against its [`StorageClient`]; outcomes land in a shared
//! [`RunStats`].

pub mod config;
pub mod driver;
pub mod error;
pub mod generator;
pub mod operation;
pub mod pool;
pub mod progress;
pub mod selector;
pub mod stats;
pub mod storage;
#[cfg(test)]
mod testing;
pub mod worker;

pub use crate::config::RunConfig;
pub use crate::driver::{BenchmarkDriver, DriverState, RunResult, WarmUpSummary};
pub use crate::error::{ConfigurationError, WarmUpError};
pub use crate::operation::OperationKind;
pub use crate::pool::{FilePool, PathProvider};
pub use crate::progress::{NullSink, ProgressSink, StdoutSink, TracingSink};
pub use crate::selector::{WeightSpec, WeightedOperationSelector};
pub use crate::stats::{RunStats, StatsSnapshot};
pub use crate::storage::{
    LocalStorage, MemStorage, SledStorage, StorageClient, StorageError, StorageType, get_clients,
};
pub use crate::worker::{RunContext, Worker, WorkerReport, WorkerSlot};
