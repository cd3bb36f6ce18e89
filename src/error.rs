use crate::operation::OperationKind;

/// Misconfiguration detected before any worker starts. Aborts the run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("total operation weight is zero, at least one percentage must be positive")]
    ZeroTotalWeight,
    #[error("weight for {kind} must be a finite non-negative number, got {weight}")]
    InvalidWeight { kind: OperationKind, weight: f64 },
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("replication factor must be at least 1")]
    ZeroReplication,
    #[error("inodes per directory must be at least 1")]
    ZeroInodesPerDir,
    #[error("expected {expected} worker slots, got {actual}")]
    SlotCountMismatch { expected: usize, actual: usize },
}

/// Failure inside one warm-up task. The task stops, the barrier does not.
#[derive(Debug, thiserror::Error)]
pub enum WarmUpError {
    #[error("path provider has no fresh path to create")]
    PathUnavailable,
    #[error("warm-up create of {path} failed")]
    Create {
        path: String,
        #[source]
        source: crate::storage::StorageError,
    },
    #[error("warm-up read of {path} failed")]
    Read {
        path: String,
        #[source]
        source: crate::storage::StorageError,
    },
}
