//! Collaborator doubles shared by the unit tests.

use crate::operation::OperationKind;
use crate::pool::PathProvider;
use crate::progress::ProgressSink;
use crate::storage::{StorageClient, StorageError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct CollectSink(Mutex<Vec<String>>);

impl CollectSink {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl ProgressSink for CollectSink {
    fn emit(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_owned());
    }
}

/// Accepts every call, counting them and keeping the first
/// [`OkClient::KEPT_PATHS`] paths it was given.
#[derive(Default, Clone)]
pub struct OkClient {
    pub calls: Arc<AtomicU64>,
    pub paths: Arc<Mutex<Vec<String>>>,
}

impl OkClient {
    pub const KEPT_PATHS: usize = 1_000;

    fn ok(&self, path: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut paths = self.paths.lock().unwrap();
        if paths.len() < Self::KEPT_PATHS {
            paths.push(path.to_owned());
        }
        Ok(())
    }
}

/// Rejects every call.
#[derive(Default, Clone)]
pub struct FailingClient {
    pub calls: Arc<AtomicU64>,
}

impl FailingClient {
    fn fail(&self, path: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(StorageError::NotFound(path.to_owned()))
    }
}

/// Succeeds after sleeping a fixed time on every call.
pub struct SlowClient {
    pub delay: Duration,
}

impl SlowClient {
    fn slow(&self, _path: &str) -> Result<(), StorageError> {
        std::thread::sleep(self.delay);
        Ok(())
    }
}

macro_rules! client_double {
    ($ty:ty, $call:ident) => {
        impl StorageClient for $ty {
            fn create(&mut self, path: &str, _: u16, _: u64) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn append(&mut self, path: &str, _: u64) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn read(&mut self, path: &str, _: u64) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
                self.$call(&format!("{from} -> {to}"))
            }
            fn delete(&mut self, path: &str) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn list_file(&mut self, path: &str) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn list_dir(&mut self, path: &str) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn chmod_file(&mut self, path: &str) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn chmod_dir(&mut self, path: &str) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn mkdir(&mut self, path: &str) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn set_replication(&mut self, path: &str, _: u16) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn stat_file(&mut self, path: &str) -> Result<(), StorageError> {
                self.$call(path)
            }
            fn stat_dir(&mut self, path: &str) -> Result<(), StorageError> {
                self.$call(path)
            }
        }
    };
}

client_double!(OkClient, ok);
client_double!(FailingClient, fail);
client_double!(SlowClient, slow);

/// Always has a path to offer.
pub struct StaticProvider;

impl PathProvider for StaticProvider {
    fn path_for_create(&mut self) -> Option<String> {
        Some("/t/new".to_owned())
    }
    fn path_for_mkdir(&mut self) -> Option<String> {
        Some("/t/dir".to_owned())
    }
    fn path_for_existing(&mut self, _kind: OperationKind) -> Option<String> {
        Some("/t/existing".to_owned())
    }
    fn rename_target(&mut self, _from: &str) -> Option<String> {
        Some("/t/renamed".to_owned())
    }
    fn on_create_succeeded(&mut self, _path: &str) {}
    fn on_mkdir_succeeded(&mut self, _path: &str) {}
    fn on_rename_succeeded(&mut self, _from: &str, _to: &str) {}
    fn on_delete_succeeded(&mut self, _path: &str) {}
}

/// Offers paths until a budget shared by all workers runs out, then none.
pub struct BudgetProvider {
    pub remaining: Arc<AtomicU64>,
}

impl BudgetProvider {
    fn take(&self, path: &str) -> Option<String> {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| path.to_owned())
    }
}

impl PathProvider for BudgetProvider {
    fn path_for_create(&mut self) -> Option<String> {
        self.take("/b/new")
    }
    fn path_for_mkdir(&mut self) -> Option<String> {
        self.take("/b/dir")
    }
    fn path_for_existing(&mut self, _kind: OperationKind) -> Option<String> {
        self.take("/b/existing")
    }
    fn rename_target(&mut self, _from: &str) -> Option<String> {
        Some("/b/renamed".to_owned())
    }
    fn on_create_succeeded(&mut self, _path: &str) {}
    fn on_mkdir_succeeded(&mut self, _path: &str) {}
    fn on_rename_succeeded(&mut self, _from: &str, _to: &str) {}
    fn on_delete_succeeded(&mut self, _path: &str) {}
}
