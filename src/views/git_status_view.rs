use std::path::Path;
use std::rc::Rc;

use tracing::info;

use crate::engine::{Engine, LeafFactory};
use crate::filesystem::{FilesystemProvider, WatchService};
use crate::repository::{Repository, StatusSnapshot, apply_status, attach};
use crate::scheduler::Host;
use crate::tree::{EntryKind, NodeId, NodeSeed, NodeVariant, Tree};

/// Every changed path of one repository, under the repository toplevel.
pub struct GitStatusView<F, W, H> {
    engine: Engine<F, W, H>,
    tree: Tree,
}

impl<F, W, H> GitStatusView<F, W, H>
where
    F: FilesystemProvider,
    W: WatchService,
    H: Host,
{
    pub fn new(engine: Engine<F, W, H>, root: impl AsRef<Path>) -> Self {
        Self {
            engine,
            tree: Tree::new(root, NodeVariant::Filesystem),
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub async fn show(&mut self, repo: &Rc<Repository>, snapshot: &StatusSnapshot) -> NodeId {
        self.tree = Tree::new(repo.toplevel(), NodeVariant::Filesystem);
        let root = self.tree.root();
        self.tree.set_expanded(root, true);

        let factory = ChangeLeaf {
            fs: self.engine.filesystem(),
        };
        let first = self
            .engine
            .populate_from_paths(&mut self.tree, root, snapshot.changed_paths(), &factory)
            .await;

        attach(&mut self.tree, root, repo);
        let decorated = apply_status(&mut self.tree, root, snapshot);
        info!(
            "{} changed entries in {}",
            decorated,
            repo.toplevel().display()
        );
        first
    }
}

struct ChangeLeaf<'a, F> {
    fs: &'a F,
}

impl<F: FilesystemProvider> LeafFactory for ChangeLeaf<'_, F> {
    // Deleted paths are gone from disk but still listed as files.
    async fn make_leaf(&self, path: &Path) -> Option<NodeSeed> {
        let kind = match self.fs.stat(path).await {
            Some(entry) => entry.kind,
            None => EntryKind::File,
        };
        Some(NodeSeed::new(kind, NodeVariant::GitChange))
    }
}
