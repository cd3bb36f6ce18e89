mod local;
mod mem;
mod namespace;
mod sled;

pub use crate::storage::local::LocalStorage;
pub use crate::storage::mem::MemStorage;
pub use crate::storage::sled::SledStorage;

use anyhow::Result;
use clap::ValueEnum;
use rand::random;
use std::path::Path;

/// Filesystem operations the benchmark drives.
///
/// Every worker owns its own client. Paths are absolute and `/`-separated.
pub trait StorageClient: Send {
    fn create(&mut self, path: &str, replication: u16, size: u64) -> Result<(), StorageError>;
    fn append(&mut self, path: &str, size: u64) -> Result<(), StorageError>;
    fn read(&mut self, path: &str, size: u64) -> Result<(), StorageError>;
    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError>;
    fn delete(&mut self, path: &str) -> Result<(), StorageError>;
    fn list_file(&mut self, path: &str) -> Result<(), StorageError>;
    fn list_dir(&mut self, path: &str) -> Result<(), StorageError>;
    fn chmod_file(&mut self, path: &str) -> Result<(), StorageError>;
    fn chmod_dir(&mut self, path: &str) -> Result<(), StorageError>;
    fn mkdir(&mut self, path: &str) -> Result<(), StorageError>;
    fn set_replication(&mut self, path: &str, factor: u16) -> Result<(), StorageError>;
    fn stat_file(&mut self, path: &str) -> Result<(), StorageError>;
    fn stat_dir(&mut self, path: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("cannot rename {from} to {to}")]
    InvalidRename { from: String, to: String },
    #[error("invalid replication factor {0}")]
    InvalidReplication(u16),
    #[error("corrupt inode record for {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sled(#[from] ::sled::Error),
}

/// Rejects relative paths, empty segments, `.` and `..` segments and trailing
/// slashes. Accepted paths cannot climb out of a backend's root.
pub(crate) fn check_path(path: &str) -> Result<(), StorageError> {
    let valid = path.starts_with('/')
        && (path == "/" || !path.ends_with('/'))
        && !path.contains("//")
        && !path.split('/').any(|seg| seg == "." || seg == "..");
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(path.to_owned()))
    }
}

/// Proper ancestors of `path`, excluding the root, shallowest first.
pub(crate) fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .map(|i| &path[..i])
}

/// Key prefix shared by everything below the directory `path`.
pub(crate) fn child_prefix(path: &str) -> String {
    if path == "/" {
        "/".to_owned()
    } else {
        format!("{path}/")
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
// Update get_clients when adding new variation
pub enum StorageType {
    Memory,
    Sled,
    Local,
}

/// Builds `count` client handles onto one backend instance.
pub fn get_clients(
    storage: StorageType,
    root: Option<&Path>,
    count: usize,
) -> Result<Vec<Box<dyn StorageClient>>> {
    let mut clients: Vec<Box<dyn StorageClient>> = Vec::with_capacity(count);
    match storage {
        StorageType::Memory => {
            let store = MemStorage::new(random());
            for _ in 0..count {
                clients.push(Box::new(store.handle(random())));
            }
        }
        StorageType::Sled => {
            let store = SledStorage::new(random())?;
            for _ in 0..count {
                clients.push(Box::new(store.handle(random())));
            }
        }
        StorageType::Local => {
            let store = match root {
                Some(root) => LocalStorage::new(root, random())?,
                None => LocalStorage::temporary(random())?,
            };
            for _ in 0..count {
                clients.push(Box::new(store.handle(random())));
            }
        }
    }
    Ok(clients)
}
