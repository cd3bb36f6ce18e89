use crate::storage::namespace::{Inode, InodeStore, NamespaceClient};
use crate::storage::StorageError;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Tree = Arc<RwLock<BTreeMap<String, Inode>>>;

#[derive(Default, Clone)]
pub struct MemTree {
    data: Tree,
}

impl MemTree {
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Inode>> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Inode>> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl InodeStore for MemTree {
    fn get(&self, path: &str) -> Result<Option<Inode>, StorageError> {
        Ok(self.read().get(path).cloned())
    }

    fn insert_new(&self, path: &str, inode: Inode) -> Result<bool, StorageError> {
        let mut tree = self.write();
        if tree.contains_key(path) {
            return Ok(false);
        }
        tree.insert(path.to_owned(), inode);
        Ok(true)
    }

    fn put(&self, path: &str, inode: Inode) -> Result<(), StorageError> {
        self.write().insert(path.to_owned(), inode);
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<Option<Inode>, StorageError> {
        Ok(self.write().remove(path))
    }

    fn update(
        &self,
        path: &str,
        f: &mut dyn FnMut(&mut Inode) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        match self.write().get_mut(path) {
            Some(inode) => f(inode),
            None => Err(StorageError::NotFound(path.to_owned())),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .read()
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// Process-local namespace; every handle sees the same tree.
pub type MemStorage = NamespaceClient<MemTree>;

impl MemStorage {
    pub fn new(seed: u64) -> Self {
        Self::with_store(MemTree::default(), seed)
    }

    pub(crate) fn entries(&self) -> usize {
        self.store().read().len()
    }
}
