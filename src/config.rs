use crate::error::ConfigurationError;
use std::time::Duration;

/// Sizing and timing for one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Wall-clock length of the timed phase.
    pub duration: Duration,
    /// Worker threads, one per slot.
    pub concurrency: usize,
    pub base_dir: String,
    pub file_size: u64,
    pub append_size: u64,
    pub replication: u16,
    /// Files each warm-up task creates before the timed phase.
    pub files_per_worker: u64,
    pub inodes_per_dir: usize,
    pub progress_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            duration: Duration::from_secs(60),
            concurrency: 1,
            base_dir: "/fsbench".to_owned(),
            file_size: 0,
            append_size: 0,
            replication: 3,
            files_per_worker: 1_000,
            inodes_per_dir: 1_000,
            progress_interval: Duration::from_secs(5),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.concurrency == 0 {
            return Err(ConfigurationError::ZeroConcurrency);
        }
        if self.replication == 0 {
            return Err(ConfigurationError::ZeroReplication);
        }
        if self.inodes_per_dir == 0 {
            return Err(ConfigurationError::ZeroInodesPerDir);
        }
        Ok(())
    }

    /// Base directory of one worker's file pool.
    pub fn worker_dir(&self, slot: usize) -> String {
        format!("{}/w{slot}", self.base_dir.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(RunConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_sizing() {
        let cfg = RunConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigurationError::ZeroConcurrency));
        let cfg = RunConfig {
            replication: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigurationError::ZeroReplication));
        let cfg = RunConfig {
            inodes_per_dir: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigurationError::ZeroInodesPerDir));
    }

    #[test]
    fn worker_dirs_are_disjoint() {
        let cfg = RunConfig {
            base_dir: "/bench/".to_owned(),
            ..Default::default()
        };
        assert_eq!(cfg.worker_dir(0), "/bench/w0");
        assert_eq!(cfg.worker_dir(12), "/bench/w12");
    }
}
