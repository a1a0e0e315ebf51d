use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use super::{DirEntry, FilesystemProvider, WatchService};
use crate::tree::{EntryKind, file_name_of};

/// In-memory filesystem with scriptable listing failures.
#[derive(Debug, Default)]
pub(crate) struct MemoryFilesystem {
    entries: RefCell<BTreeMap<PathBuf, EntryKind>>,
    failing: RefCell<HashSet<PathBuf>>,
    list_calls: Cell<usize>,
}

impl MemoryFilesystem {
    pub(crate) fn new() -> Self {
        let fs = Self::default();
        fs.entries
            .borrow_mut()
            .insert(PathBuf::from("/"), EntryKind::Directory);
        fs
    }

    pub(crate) fn with_dir(self, path: &str) -> Self {
        self.add(path, EntryKind::Directory);
        self
    }

    pub(crate) fn with_file(self, path: &str) -> Self {
        self.add(path, EntryKind::File);
        self
    }

    /// Adds `path` and any missing ancestor directories.
    pub(crate) fn add(&self, path: impl AsRef<Path>, kind: EntryKind) {
        let path = path.as_ref();
        let mut entries = self.entries.borrow_mut();
        for ancestor in path.ancestors().skip(1) {
            entries
                .entry(ancestor.to_path_buf())
                .or_insert(EntryKind::Directory);
        }
        entries.insert(path.to_path_buf(), kind);
    }

    /// Removes `path` and everything below it.
    pub(crate) fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.entries
            .borrow_mut()
            .retain(|candidate, _| !candidate.starts_with(path));
    }

    pub(crate) fn fail_listing(&self, path: impl AsRef<Path>) {
        self.failing.borrow_mut().insert(path.as_ref().to_path_buf());
    }

    pub(crate) fn heal(&self) {
        self.failing.borrow_mut().clear();
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.get()
    }
}

impl FilesystemProvider for MemoryFilesystem {
    async fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        self.list_calls.set(self.list_calls.get() + 1);
        if self.failing.borrow().contains(dir) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "listing denied",
            ));
        }

        let entries = self.entries.borrow();
        match entries.get(dir) {
            Some(EntryKind::Directory) => {}
            Some(_) => return Err(io::Error::other("not a directory")),
            None => return Err(io::Error::from(io::ErrorKind::NotFound)),
        }

        Ok(entries
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, kind)| DirEntry::new(file_name_of(path), *kind))
            .collect())
    }

    async fn stat(&self, path: &Path) -> Option<DirEntry> {
        self.entries
            .borrow()
            .get(path)
            .map(|kind| DirEntry::new(file_name_of(path), *kind))
    }
}

/// Watch service that keeps a per-path balance of registrations.
#[derive(Debug, Default)]
pub(crate) struct RecordingWatchService {
    balance: RefCell<HashMap<PathBuf, i32>>,
}

impl RecordingWatchService {
    pub(crate) fn is_watched(&self, path: impl AsRef<Path>) -> bool {
        self.balance
            .borrow()
            .get(path.as_ref())
            .is_some_and(|count| *count > 0)
    }

    pub(crate) fn active(&self) -> usize {
        self.balance.borrow().values().filter(|c| **c > 0).count()
    }

    /// Every path was watched at most once and never unwatched more often.
    pub(crate) fn is_balanced(&self) -> bool {
        self.balance.borrow().values().all(|c| *c == 0 || *c == 1)
    }
}

impl WatchService for RecordingWatchService {
    fn watch(&self, path: &Path) {
        *self
            .balance
            .borrow_mut()
            .entry(path.to_path_buf())
            .or_default() += 1;
    }

    fn unwatch(&self, path: &Path) {
        *self
            .balance
            .borrow_mut()
            .entry(path.to_path_buf())
            .or_default() -= 1;
    }
}
