use crate::storage::StorageError;
use crate::storage::namespace::{Inode, InodeStore, NamespaceClient};
use std::sync::Arc;
use tempfile::TempDir;

struct SledInner {
    db: ::sled::Db,
    _dir: TempDir,
}

/// Inode table kept in a sled database under a temporary directory.
#[derive(Clone)]
pub struct SledTree {
    inner: Arc<SledInner>,
}

impl SledTree {
    fn new() -> Result<Self, StorageError> {
        let dir = TempDir::new()?;
        let db = ::sled::open(dir.path())?;
        Ok(SledTree {
            inner: Arc::new(SledInner { db, _dir: dir }),
        })
    }

    fn db(&self) -> &::sled::Db {
        &self.inner.db
    }
}

impl InodeStore for SledTree {
    fn get(&self, path: &str) -> Result<Option<Inode>, StorageError> {
        self.db()
            .get(path)?
            .map(|v| Inode::decode(path, &v))
            .transpose()
    }

    fn insert_new(&self, path: &str, inode: Inode) -> Result<bool, StorageError> {
        let swapped = self
            .db()
            .compare_and_swap(path, None::<&[u8]>, Some(inode.encode()))?;
        Ok(swapped.is_ok())
    }

    fn put(&self, path: &str, inode: Inode) -> Result<(), StorageError> {
        self.db().insert(path, inode.encode())?;
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<Option<Inode>, StorageError> {
        self.db()
            .remove(path)?
            .map(|v| Inode::decode(path, &v))
            .transpose()
    }

    // Paths are owned by a single worker, so read-modify-write needs no retry loop.
    fn update(
        &self,
        path: &str,
        f: &mut dyn FnMut(&mut Inode) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let mut inode = self
            .get(path)?
            .ok_or_else(|| StorageError::NotFound(path.to_owned()))?;
        f(&mut inode)?;
        self.put(path, inode)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = vec![];
        for item in self.db().scan_prefix(prefix) {
            let (k, _) = item?;
            let key = String::from_utf8(k.to_vec())
                .map_err(|_| StorageError::Corrupt(prefix.to_owned()))?;
            keys.push(key);
        }
        Ok(keys)
    }
}

pub type SledStorage = NamespaceClient<SledTree>;

impl SledStorage {
    pub fn new(seed: u64) -> Result<Self, StorageError> {
        Ok(Self::with_store(SledTree::new()?, seed))
    }
}
