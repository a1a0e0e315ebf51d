use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ext::normalize_path;

/// What the editor knows about one open buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferState {
    pub bufnr: Option<u32>,
    pub modified: bool,
}

/// Open editor buffers keyed by absolute path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenBuffers {
    buffers: BTreeMap<PathBuf, BufferState>,
}

impl OpenBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, state: BufferState) {
        self.buffers.insert(normalize_path(path.as_ref()), state);
    }

    pub fn with(mut self, path: impl AsRef<Path>, state: BufferState) -> Self {
        self.insert(path, state);
        self
    }

    pub fn get(&self, path: &Path) -> Option<&BufferState> {
        self.buffers.get(path)
    }

    pub fn is_modified(&self, path: &Path) -> bool {
        self.get(path).is_some_and(|state| state.modified)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.buffers.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
