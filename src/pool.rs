use crate::operation::OperationKind;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Hands out target paths and tracks what exists in a worker's namespace.
///
/// `None` means the provider has nothing usable right now; the caller skips
/// the operation instead of counting it as failed.
pub trait PathProvider: Send {
    fn path_for_create(&mut self) -> Option<String>;
    fn path_for_mkdir(&mut self) -> Option<String>;
    fn path_for_existing(&mut self, kind: OperationKind) -> Option<String>;
    fn rename_target(&mut self, from: &str) -> Option<String>;

    fn on_create_succeeded(&mut self, path: &str);
    fn on_mkdir_succeeded(&mut self, path: &str);
    fn on_rename_succeeded(&mut self, from: &str, to: &str);
    fn on_delete_succeeded(&mut self, path: &str);
}

/// Per-worker pool of file and directory paths under `<base>`.
///
/// New files go to `<base>/d<N>/f<M>`; a fresh `d<N>` is opened every
/// `inodes_per_dir` files. Existing entries are picked uniformly at random.
pub struct FilePool {
    base: String,
    inodes_per_dir: usize,
    next_file: u64,
    next_dir: u64,
    current_dir: String,
    in_current_dir: usize,
    files: Vec<String>,
    dirs: Vec<String>,
    known_dirs: HashSet<String>,
    last_pick: Option<usize>,
    rng: SmallRng,
}

impl FilePool {
    pub fn new(base: impl Into<String>, inodes_per_dir: usize, seed: u64) -> Self {
        let base = base.into();
        let base = base.trim_end_matches('/').to_owned();
        let mut pool = FilePool {
            current_dir: String::new(),
            base,
            inodes_per_dir: inodes_per_dir.max(1),
            next_file: 0,
            next_dir: 0,
            in_current_dir: 0,
            files: vec![],
            dirs: vec![],
            known_dirs: HashSet::new(),
            last_pick: None,
            rng: SmallRng::seed_from_u64(seed),
        };
        pool.current_dir = pool.fresh_dir();
        pool
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    fn fresh_dir(&mut self) -> String {
        let dir = format!("{}/d{}", self.base, self.next_dir);
        self.next_dir += 1;
        dir
    }

    fn fresh_file(&mut self) -> String {
        if self.in_current_dir >= self.inodes_per_dir {
            self.current_dir = self.fresh_dir();
            self.in_current_dir = 0;
        }
        self.in_current_dir += 1;
        let file = format!("{}/f{}", self.current_dir, self.next_file);
        self.next_file += 1;
        file
    }

    fn remember_dir(&mut self, dir: &str) {
        if self.known_dirs.insert(dir.to_owned()) {
            self.dirs.push(dir.to_owned());
        }
    }

    fn remember_parent(&mut self, path: &str) {
        match path.rsplit_once('/') {
            Some((parent, _)) if !parent.is_empty() => self.remember_dir(parent),
            _ => {}
        }
    }

    /// Position of `path` in `files`, trying the last random pick first.
    fn position(&self, path: &str) -> Option<usize> {
        match self.last_pick {
            Some(i) if self.files.get(i).is_some_and(|f| f == path) => Some(i),
            _ => self.files.iter().position(|f| f == path),
        }
    }

    fn forget_file(&mut self, path: &str) {
        if let Some(i) = self.position(path) {
            self.files.swap_remove(i);
        }
        self.last_pick = None;
    }
}

impl PathProvider for FilePool {
    fn path_for_create(&mut self) -> Option<String> {
        Some(self.fresh_file())
    }

    fn path_for_mkdir(&mut self) -> Option<String> {
        Some(self.fresh_dir())
    }

    fn path_for_existing(&mut self, kind: OperationKind) -> Option<String> {
        if kind.targets_dir() {
            if self.dirs.is_empty() {
                return None;
            }
            let i = self.rng.random_range(0..self.dirs.len());
            return Some(self.dirs[i].clone());
        }
        if self.files.is_empty() {
            return None;
        }
        let i = self.rng.random_range(0..self.files.len());
        self.last_pick = Some(i);
        Some(self.files[i].clone())
    }

    fn rename_target(&mut self, _from: &str) -> Option<String> {
        Some(self.fresh_file())
    }

    fn on_create_succeeded(&mut self, path: &str) {
        self.files.push(path.to_owned());
        self.remember_parent(path);
    }

    fn on_mkdir_succeeded(&mut self, path: &str) {
        self.remember_dir(path);
    }

    fn on_rename_succeeded(&mut self, from: &str, to: &str) {
        self.forget_file(from);
        self.on_create_succeeded(to);
    }

    fn on_delete_succeeded(&mut self, path: &str) {
        self.forget_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_has_nothing_existing() {
        let mut pool = FilePool::new("/bench/w0", 4, 1);
        assert_eq!(pool.path_for_existing(OperationKind::Read), None);
        assert_eq!(pool.path_for_existing(OperationKind::StatDir), None);
    }

    #[test]
    fn rolls_over_to_a_new_directory() {
        let mut pool = FilePool::new("/bench/w0/", 2, 1);
        let paths: Vec<_> = (0..5).map(|_| pool.path_for_create().unwrap()).collect();
        assert_eq!(
            paths,
            vec![
                "/bench/w0/d0/f0",
                "/bench/w0/d0/f1",
                "/bench/w0/d1/f2",
                "/bench/w0/d1/f3",
                "/bench/w0/d2/f4",
            ]
        );
        assert_eq!(pool.path_for_mkdir().unwrap(), "/bench/w0/d3");
    }

    #[test]
    fn tracks_created_renamed_and_deleted_files() {
        let mut pool = FilePool::new("/b", 10, 9);
        let a = pool.path_for_create().unwrap();
        let b = pool.path_for_create().unwrap();
        pool.on_create_succeeded(&a);
        pool.on_create_succeeded(&b);
        assert_eq!(pool.file_count(), 2);
        assert_eq!(pool.dir_count(), 1);
        assert_eq!(pool.path_for_existing(OperationKind::ListDir).unwrap(), "/b/d0");

        let picked = pool.path_for_existing(OperationKind::Rename).unwrap();
        let to = pool.rename_target(&picked).unwrap();
        pool.on_rename_succeeded(&picked, &to);
        assert_eq!(pool.file_count(), 2);
        for _ in 0..20 {
            assert_ne!(pool.path_for_existing(OperationKind::Read).unwrap(), picked);
        }

        pool.on_delete_succeeded(&to);
        pool.on_delete_succeeded("/b/unknown");
        assert_eq!(pool.file_count(), 1);

        let dir = pool.path_for_mkdir().unwrap();
        pool.on_mkdir_succeeded(&dir);
        pool.on_mkdir_succeeded(&dir);
        assert_eq!(pool.dir_count(), 2);
    }
}
