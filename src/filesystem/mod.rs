//! Filesystem collaborators consumed by the tree engine.
//!
//! The engine never calls `std::fs` itself. It lists and stats through a
//! [`FilesystemProvider`] and registers directory watches through a
//! [`WatchService`], both of which may be swapped out by the host.

mod local;
mod watch;

#[cfg(test)]
pub(crate) mod testing;

use std::io;
use std::path::Path;

pub use local::LocalFilesystem;
pub use watch::{NoopWatchService, NotifyWatchService, WatchEvent, WatchService};

use crate::tree::{EntryKind, LinkInfo, NodeSeed, NodeVariant};

/// One child as reported by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub link: Option<LinkInfo>,
    pub size: Option<u64>,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            link: None,
            size: None,
        }
    }

    pub fn seed(&self, variant: NodeVariant) -> NodeSeed {
        NodeSeed {
            kind: self.kind,
            variant,
            link: self.link.clone(),
            size: self.size,
            modified: false,
        }
    }
}

pub trait FilesystemProvider {
    /// Lists the direct children of `dir`.
    async fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;

    /// Describes a single path, `None` when it does not exist.
    async fn stat(&self, path: &Path) -> Option<DirEntry>;

    async fn exists(&self, path: &Path) -> bool {
        self.stat(path).await.is_some()
    }
}

impl<F: FilesystemProvider> FilesystemProvider for &F {
    async fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        (**self).list(dir).await
    }

    async fn stat(&self, path: &Path) -> Option<DirEntry> {
        (**self).stat(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        (**self).exists(path).await
    }
}
