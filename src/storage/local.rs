use crate::generator::PayloadGen;
use crate::storage::{StorageClient, StorageError, check_path};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Benchmark paths mapped onto a directory of the local filesystem.
pub struct LocalStorage {
    root: Arc<PathBuf>,
    // Keeps a temporary root alive for as long as any handle exists.
    _tmp: Option<Arc<TempDir>>,
    payload: PayloadGen,
}

impl LocalStorage {
    pub fn new(root: &Path, seed: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(root)?;
        Ok(LocalStorage {
            root: Arc::new(root.to_path_buf()),
            _tmp: None,
            payload: PayloadGen::new(seed),
        })
    }

    pub fn temporary(seed: u64) -> Result<Self, StorageError> {
        let tmp = TempDir::new()?;
        Ok(LocalStorage {
            root: Arc::new(tmp.path().to_path_buf()),
            _tmp: Some(Arc::new(tmp)),
            payload: PayloadGen::new(seed),
        })
    }

    pub fn handle(&self, seed: u64) -> LocalStorage {
        LocalStorage {
            root: self.root.clone(),
            _tmp: self._tmp.clone(),
            payload: PayloadGen::new(seed),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        check_path(path)?;
        Ok(self.root.join(path.trim_start_matches('/')))
    }

    fn metadata(&self, path: &str) -> Result<(PathBuf, fs::Metadata), StorageError> {
        let local = self.resolve(path)?;
        match fs::metadata(&local) {
            Ok(meta) => Ok((local, meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(path.to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    fn file(&self, path: &str) -> Result<PathBuf, StorageError> {
        let (local, meta) = self.metadata(path)?;
        if meta.is_dir() {
            return Err(StorageError::IsADirectory(path.to_owned()));
        }
        Ok(local)
    }

    fn dir(&self, path: &str) -> Result<PathBuf, StorageError> {
        let (local, meta) = self.metadata(path)?;
        if !meta.is_dir() {
            return Err(StorageError::NotADirectory(path.to_owned()));
        }
        Ok(local)
    }

    fn make_parent(local: &Path) -> Result<(), StorageError> {
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn chmod(local: &Path, mode: u32) -> Result<(), StorageError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(local, fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        {
            let _ = mode;
            let mut perms = fs::metadata(local)?.permissions();
            perms.set_readonly(false);
            fs::set_permissions(local, perms)?;
        }
        Ok(())
    }
}

impl StorageClient for LocalStorage {
    fn create(&mut self, path: &str, replication: u16, size: u64) -> Result<(), StorageError> {
        if replication == 0 {
            return Err(StorageError::InvalidReplication(replication));
        }
        let local = self.resolve(path)?;
        Self::make_parent(&local)?;
        let mut f = match File::create_new(&local) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(path.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };
        self.payload.write_to(&mut f, size)?;
        Ok(())
    }

    fn append(&mut self, path: &str, size: u64) -> Result<(), StorageError> {
        let local = self.file(path)?;
        let mut f = OpenOptions::new().append(true).open(local)?;
        self.payload.write_to(&mut f, size)?;
        Ok(())
    }

    fn read(&mut self, path: &str, size: u64) -> Result<(), StorageError> {
        let local = self.file(path)?;
        io::copy(&mut File::open(local)?.take(size), &mut io::sink())?;
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        let (src, _) = self.metadata(from)?;
        let dst = self.resolve(to)?;
        if dst.starts_with(&src) {
            return Err(StorageError::InvalidRename {
                from: from.to_owned(),
                to: to.to_owned(),
            });
        }
        if dst.exists() {
            return Err(StorageError::AlreadyExists(to.to_owned()));
        }
        Self::make_parent(&dst)?;
        fs::rename(src, dst)?;
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<(), StorageError> {
        if path == "/" {
            return Err(StorageError::InvalidPath(path.to_owned()));
        }
        let (local, meta) = self.metadata(path)?;
        if meta.is_dir() {
            fs::remove_dir_all(local)?;
        } else {
            fs::remove_file(local)?;
        }
        Ok(())
    }

    fn list_file(&mut self, path: &str) -> Result<(), StorageError> {
        self.file(path).map(|_| ())
    }

    fn list_dir(&mut self, path: &str) -> Result<(), StorageError> {
        let local = self.dir(path)?;
        let mut entries = 0usize;
        for entry in fs::read_dir(local)? {
            entry?;
            entries += 1;
        }
        std::hint::black_box(entries);
        Ok(())
    }

    fn chmod_file(&mut self, path: &str) -> Result<(), StorageError> {
        let local = self.file(path)?;
        Self::chmod(&local, 0o644)
    }

    fn chmod_dir(&mut self, path: &str) -> Result<(), StorageError> {
        let local = self.dir(path)?;
        Self::chmod(&local, 0o755)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), StorageError> {
        let local = self.resolve(path)?;
        if local.is_file() {
            return Err(StorageError::AlreadyExists(path.to_owned()));
        }
        fs::create_dir_all(local)?;
        Ok(())
    }

    // A local disk has no replicas; the call only checks its inputs.
    fn set_replication(&mut self, path: &str, factor: u16) -> Result<(), StorageError> {
        if factor == 0 {
            return Err(StorageError::InvalidReplication(factor));
        }
        self.file(path).map(|_| ())
    }

    fn stat_file(&mut self, path: &str) -> Result<(), StorageError> {
        self.file(path).map(|_| ())
    }

    fn stat_dir(&mut self, path: &str) -> Result<(), StorageError> {
        self.dir(path).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::PAYLOAD_CHUNK;

    #[test]
    fn writes_real_files() {
        let dir = TempDir::new().unwrap();
        let mut fs_client = LocalStorage::new(dir.path(), 1).unwrap();
        fs_client.create("/bench/d0/f0", 1, 100).unwrap();
        fs_client.append("/bench/d0/f0", 28).unwrap();
        assert_eq!(
            fs::metadata(dir.path().join("bench/d0/f0")).unwrap().len(),
            128
        );
        fs_client.read("/bench/d0/f0", 64).unwrap();
        fs_client.chmod_file("/bench/d0/f0").unwrap();
        fs_client.chmod_dir("/bench/d0").unwrap();
        fs_client.list_dir("/bench").unwrap();
        fs_client.set_replication("/bench/d0/f0", 3).unwrap();

        assert!(matches!(
            fs_client.create("/bench/d0/f0", 1, 1),
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(matches!(
            fs_client.stat_dir("/bench/d0/f0"),
            Err(StorageError::NotADirectory(_))
        ));
        assert!(matches!(
            fs_client.read("/bench/missing", 1),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn rename_mkdir_and_delete() {
        let mut fs_client = LocalStorage::temporary(2).unwrap();
        fs_client.mkdir("/a/b").unwrap();
        fs_client.create("/a/b/f", 1, 0).unwrap();
        fs_client.rename("/a/b/f", "/c/g").unwrap();
        fs_client.stat_file("/c/g").unwrap();
        assert!(fs_client.stat_file("/a/b/f").is_err());
        assert!(matches!(
            fs_client.rename("/a", "/a/b/inner"),
            Err(StorageError::InvalidRename { .. })
        ));

        fs_client.delete("/a").unwrap();
        assert!(fs_client.stat_dir("/a").is_err());
        assert!(fs_client.delete("/").is_err());
    }

    #[test]
    fn large_files_are_written_and_read_in_chunks() {
        let dir = TempDir::new().unwrap();
        let mut fs_client = LocalStorage::new(dir.path(), 7).unwrap();
        let size = 3 * PAYLOAD_CHUNK as u64 + 1;
        fs_client.create("/big", 1, size).unwrap();
        fs_client.append("/big", PAYLOAD_CHUNK as u64).unwrap();
        fs_client.read("/big", u64::MAX).unwrap();
        assert_eq!(
            fs::metadata(dir.path().join("big")).unwrap().len(),
            size + PAYLOAD_CHUNK as u64
        );
    }

    #[test]
    fn paths_cannot_leave_the_root() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        let mut fs_client = LocalStorage::new(&root, 6).unwrap();
        fs::write(outer.path().join("victim"), b"keep").unwrap();

        for path in ["/../escaped", "/a/../../escaped", "/./escaped"] {
            assert!(matches!(
                fs_client.create(path, 1, 4),
                Err(StorageError::InvalidPath(_))
            ));
        }
        assert!(matches!(
            fs_client.delete("/../victim"),
            Err(StorageError::InvalidPath(_))
        ));
        fs_client.create("/inside", 1, 4).unwrap();
        assert!(matches!(
            fs_client.rename("/inside", "/../moved"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            fs_client.mkdir("/../outside"),
            Err(StorageError::InvalidPath(_))
        ));

        assert!(!outer.path().join("escaped").exists());
        assert!(!outer.path().join("moved").exists());
        assert!(!outer.path().join("outside").exists());
        assert!(outer.path().join("victim").is_file());
        assert!(root.join("inside").is_file());
    }

    #[test]
    fn handles_share_the_temporary_root() {
        let store = LocalStorage::temporary(3).unwrap();
        let mut a = store.handle(4);
        let mut b = store.handle(5);
        drop(store);
        a.create("/x", 1, 1).unwrap();
        b.stat_file("/x").unwrap();
    }
}
