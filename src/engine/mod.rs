//! Algorithms that keep a [`Tree`] consistent with its sources.
//!
//! * [`Engine::scan_directory`] re-lists one directory and merges the result
//!   into the existing children, keeping node ids stable.
//! * [`Engine::populate_from_paths`] grows a tree out of a flat list of
//!   paths, synthesizing the directories in between.
//! * [`Engine::add`] and [`Engine::remove`] apply single-path changes.
//!
//! Every operation borrows the tree mutably for its whole duration,
//! suspension points included, so two operations can never interleave on
//! the same tree.

mod filter;
mod mutate;
mod overlay;
mod populate;
mod scandir;

use std::path::PathBuf;

use tracing::debug;

pub use filter::EntryFilter;
pub use overlay::{BufferState, OpenBuffers};
pub use populate::{LeafFactory, StatLeaf};
pub use scandir::{RefreshSummary, ScanSummary};

use crate::filesystem::{FilesystemProvider, WatchService};
use crate::scheduler::Host;
use crate::tree::{NodeId, NodeVariant, Tree};

pub struct Engine<F, W, H> {
    fs: F,
    watcher: W,
    host: H,
    filter: EntryFilter,
    buffers: OpenBuffers,
    watching: bool,
}

impl<F, W, H> Engine<F, W, H>
where
    F: FilesystemProvider,
    W: WatchService,
    H: Host,
{
    pub fn new(fs: F, watcher: W, host: H) -> Self {
        Self {
            fs,
            watcher,
            host,
            filter: EntryFilter::default(),
            buffers: OpenBuffers::default(),
            watching: false,
        }
    }

    pub fn with_filter(mut self, filter: EntryFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Enables directory watches for nodes created under watched directories.
    pub fn with_watching(mut self, watching: bool) -> Self {
        self.watching = watching;
        self
    }

    pub fn set_open_buffers(&mut self, buffers: OpenBuffers) {
        self.buffers = buffers;
    }

    pub fn open_buffers(&self) -> &OpenBuffers {
        &self.buffers
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// Registers a watch for a directory node unless it already holds one.
    pub fn watch(&self, tree: &mut Tree, id: NodeId) -> bool {
        if !self.watching {
            return false;
        }
        let Some(node) = tree.get_mut(id) else {
            return false;
        };
        if node.watcher_registered || !node.is_container() || node.variant.is_synthetic() {
            return false;
        }
        self.watcher.watch(&node.path);
        node.watcher_registered = true;
        true
    }

    /// Unlinks and frees `id` with its subtree, releasing every watch held
    /// inside it.
    pub(crate) fn discard(&self, tree: &mut Tree, id: NodeId) {
        tree.detach(id);
        let released = tree.free_subtree(id);
        self.release_watches(released);
    }

    pub(crate) fn release_watches(&self, paths: Vec<PathBuf>) {
        for path in paths {
            debug!("Releasing watch on {}", path.display());
            self.watcher.unwatch(&path);
        }
    }

    /// Re-applies the buffer overlay to the direct children of `dir`.
    pub(crate) fn apply_buffer_overlay(&self, tree: &mut Tree, dir: NodeId) {
        let children = tree.children(dir).to_vec();
        for child in children {
            if let Some(node) = tree.get_mut(child) {
                node.modified = self.buffers.is_modified(&node.path);
            }
        }
    }

    /// Children created under `parent` take over its view, except under
    /// synthetic containers, where they are plain filesystem nodes.
    pub(crate) fn child_variant(tree: &Tree, parent: NodeId) -> NodeVariant {
        match tree.get(parent).map(|n| &n.variant) {
            Some(NodeVariant::Buffer { .. }) => NodeVariant::Buffer { bufnr: None },
            Some(variant) if !variant.is_synthetic() => variant.clone(),
            _ => NodeVariant::Filesystem,
        }
    }
}
