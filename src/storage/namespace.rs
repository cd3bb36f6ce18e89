use crate::generator::PayloadGen;
use crate::storage::{StorageClient, StorageError, ancestors, check_path, child_prefix};

pub(crate) const FILE_MODE: u32 = 0o644;
pub(crate) const DIR_MODE: u32 = 0o755;

#[derive(Debug, Clone, PartialEq)]
pub enum Inode {
    File {
        data: Vec<u8>,
        replication: u16,
        mode: u32,
    },
    Dir {
        mode: u32,
    },
}

impl Inode {
    pub(crate) fn dir() -> Self {
        Inode::Dir { mode: DIR_MODE }
    }

    fn is_dir(&self) -> bool {
        matches!(self, Inode::Dir { .. })
    }

    /// `[tag][mode u32][replication u16][data..]`, little endian.
    pub(crate) fn encode(&self) -> Vec<u8> {
        match self {
            Inode::File {
                data,
                replication,
                mode,
            } => {
                let mut out = Vec::with_capacity(7 + data.len());
                out.push(b'f');
                out.extend_from_slice(&mode.to_le_bytes());
                out.extend_from_slice(&replication.to_le_bytes());
                out.extend_from_slice(data);
                out
            }
            Inode::Dir { mode } => {
                let mut out = Vec::with_capacity(5);
                out.push(b'd');
                out.extend_from_slice(&mode.to_le_bytes());
                out
            }
        }
    }

    pub(crate) fn decode(path: &str, bytes: &[u8]) -> Result<Self, StorageError> {
        let corrupt = || StorageError::Corrupt(path.to_owned());
        let mode = bytes
            .get(1..5)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or_else(corrupt)?;
        match bytes[0] {
            b'd' if bytes.len() == 5 => Ok(Inode::Dir { mode }),
            b'f' => {
                let replication = bytes
                    .get(5..7)
                    .and_then(|b| b.try_into().ok())
                    .map(u16::from_le_bytes)
                    .ok_or_else(corrupt)?;
                Ok(Inode::File {
                    data: bytes[7..].to_vec(),
                    replication,
                    mode,
                })
            }
            _ => Err(corrupt()),
        }
    }
}

/// Flat path-keyed inode table. The root directory is implicit.
///
/// Clones are handles onto the same table.
pub trait InodeStore: Clone + Send {
    fn get(&self, path: &str) -> Result<Option<Inode>, StorageError>;
    /// Inserts only if `path` is vacant; returns whether it did.
    fn insert_new(&self, path: &str, inode: Inode) -> Result<bool, StorageError>;
    fn put(&self, path: &str, inode: Inode) -> Result<(), StorageError>;
    fn remove(&self, path: &str) -> Result<Option<Inode>, StorageError>;
    /// Applies `f` to the inode at `path` in place.
    fn update(
        &self,
        path: &str,
        f: &mut dyn FnMut(&mut Inode) -> Result<(), StorageError>,
    ) -> Result<(), StorageError>;
    /// Every key starting with `prefix`, in key order.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// A [`StorageClient`] over any [`InodeStore`], with hierarchical semantics:
/// create and mkdir make missing parents, delete and rename act on subtrees.
pub struct NamespaceClient<S> {
    store: S,
    payload: PayloadGen,
}

impl<S: InodeStore> NamespaceClient<S> {
    pub fn with_store(store: S, seed: u64) -> Self {
        NamespaceClient {
            store,
            payload: PayloadGen::new(seed),
        }
    }

    /// Another client onto the same store, with its own payload generator.
    pub fn handle(&self, seed: u64) -> Self {
        Self::with_store(self.store.clone(), seed)
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    fn lookup(&self, path: &str) -> Result<Inode, StorageError> {
        check_path(path)?;
        if path == "/" {
            return Ok(Inode::dir());
        }
        self.store
            .get(path)?
            .ok_or_else(|| StorageError::NotFound(path.to_owned()))
    }

    fn file(&self, path: &str) -> Result<Inode, StorageError> {
        let inode = self.lookup(path)?;
        if inode.is_dir() {
            return Err(StorageError::IsADirectory(path.to_owned()));
        }
        Ok(inode)
    }

    fn dir(&self, path: &str) -> Result<(), StorageError> {
        if !self.lookup(path)?.is_dir() {
            return Err(StorageError::NotADirectory(path.to_owned()));
        }
        Ok(())
    }

    fn make_parents(&self, path: &str) -> Result<(), StorageError> {
        for ancestor in ancestors(path) {
            if !self.store.insert_new(ancestor, Inode::dir())? {
                self.dir(ancestor)?;
            }
        }
        Ok(())
    }

    fn update_file(
        &self,
        path: &str,
        mut f: impl FnMut(&mut Vec<u8>, &mut u16, &mut u32),
    ) -> Result<(), StorageError> {
        check_path(path)?;
        self.store.update(path, &mut |inode| match inode {
            Inode::File {
                data,
                replication,
                mode,
            } => {
                f(data, replication, mode);
                Ok(())
            }
            Inode::Dir { .. } => Err(StorageError::IsADirectory(path.to_owned())),
        })
    }

    fn direct_children(&self, path: &str) -> Result<usize, StorageError> {
        let prefix = child_prefix(path);
        let keys = self.store.keys_with_prefix(&prefix)?;
        Ok(keys
            .iter()
            .filter(|k| !k[prefix.len()..].contains('/'))
            .count())
    }
}

impl<S: InodeStore> StorageClient for NamespaceClient<S> {
    fn create(&mut self, path: &str, replication: u16, size: u64) -> Result<(), StorageError> {
        check_path(path)?;
        if replication == 0 {
            return Err(StorageError::InvalidReplication(replication));
        }
        if path == "/" {
            return Err(StorageError::AlreadyExists(path.to_owned()));
        }
        self.make_parents(path)?;
        let mut data = vec![];
        self.payload.write_to(&mut data, size)?;
        let inode = Inode::File {
            data,
            replication,
            mode: FILE_MODE,
        };
        if self.store.insert_new(path, inode)? {
            Ok(())
        } else {
            Err(StorageError::AlreadyExists(path.to_owned()))
        }
    }

    fn append(&mut self, path: &str, size: u64) -> Result<(), StorageError> {
        let mut extra = vec![];
        self.payload.write_to(&mut extra, size)?;
        self.update_file(path, |data, _, _| data.extend_from_slice(&extra))
    }

    fn read(&mut self, path: &str, size: u64) -> Result<(), StorageError> {
        if let Inode::File { data, .. } = self.file(path)? {
            let n = usize::try_from(size).map_or(data.len(), |size| data.len().min(size));
            std::hint::black_box(&data[..n]);
        }
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        check_path(to)?;
        let inode = self.lookup(from)?;
        if from == "/" || to == "/" || to.starts_with(&child_prefix(from)) {
            return Err(StorageError::InvalidRename {
                from: from.to_owned(),
                to: to.to_owned(),
            });
        }
        self.make_parents(to)?;
        let is_dir = inode.is_dir();
        if !self.store.insert_new(to, inode)? {
            return Err(StorageError::AlreadyExists(to.to_owned()));
        }
        if is_dir {
            let from_prefix = child_prefix(from);
            for key in self.store.keys_with_prefix(&from_prefix)? {
                if let Some(child) = self.store.remove(&key)? {
                    let moved = format!("{to}/{}", &key[from_prefix.len()..]);
                    self.store.put(&moved, child)?;
                }
            }
        }
        self.store.remove(from)?;
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<(), StorageError> {
        let inode = self.lookup(path)?;
        if path == "/" {
            return Err(StorageError::InvalidPath(path.to_owned()));
        }
        if inode.is_dir() {
            for key in self.store.keys_with_prefix(&child_prefix(path))? {
                self.store.remove(&key)?;
            }
        }
        self.store
            .remove(path)?
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(path.to_owned()))
    }

    fn list_file(&mut self, path: &str) -> Result<(), StorageError> {
        self.file(path).map(|_| ())
    }

    fn list_dir(&mut self, path: &str) -> Result<(), StorageError> {
        self.dir(path)?;
        std::hint::black_box(self.direct_children(path)?);
        Ok(())
    }

    fn chmod_file(&mut self, path: &str) -> Result<(), StorageError> {
        self.update_file(path, |_, _, mode| *mode = FILE_MODE)
    }

    fn chmod_dir(&mut self, path: &str) -> Result<(), StorageError> {
        self.dir(path)?;
        if path == "/" {
            return Ok(());
        }
        self.store.update(path, &mut |inode| match inode {
            Inode::Dir { mode } => {
                *mode = DIR_MODE;
                Ok(())
            }
            Inode::File { .. } => Err(StorageError::NotADirectory(path.to_owned())),
        })
    }

    fn mkdir(&mut self, path: &str) -> Result<(), StorageError> {
        check_path(path)?;
        if path == "/" {
            return Ok(());
        }
        self.make_parents(path)?;
        if !self.store.insert_new(path, Inode::dir())? {
            self.dir(path)
                .map_err(|_| StorageError::AlreadyExists(path.to_owned()))?;
        }
        Ok(())
    }

    fn set_replication(&mut self, path: &str, factor: u16) -> Result<(), StorageError> {
        if factor == 0 {
            return Err(StorageError::InvalidReplication(factor));
        }
        self.update_file(path, |_, replication, _| *replication = factor)
    }

    fn stat_file(&mut self, path: &str) -> Result<(), StorageError> {
        self.file(path).map(|_| ())
    }

    fn stat_dir(&mut self, path: &str) -> Result<(), StorageError> {
        self.dir(path)
    }
}
