use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::engine::{Engine, StatLeaf};
use crate::filesystem::{FilesystemProvider, WatchService};
use crate::scheduler::Host;
use crate::tree::{EntryKind, NodeId, NodeSeed, NodeVariant, Tree};

/// What a search provider came back with. A failed search is an ordinary
/// outcome carrying the message to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Matches(Vec<PathBuf>),
    Failed(String),
}

/// Flat search results arranged under their common root.
pub struct SearchView<F, W, H> {
    engine: Engine<F, W, H>,
    tree: Tree,
}

impl<F, W, H> SearchView<F, W, H>
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

    /// Replaces the tree with the results of one search below `root`.
    ///
    /// Returns the first result for the cursor, or the provider's message
    /// when the search failed. The message is also shown as the only child.
    pub async fn show(
        &mut self,
        root: impl AsRef<Path>,
        outcome: SearchOutcome,
    ) -> Result<NodeId, String> {
        self.tree = Tree::new(root, NodeVariant::Filesystem);
        let root = self.tree.root();
        self.tree.set_expanded(root, true);

        match outcome {
            SearchOutcome::Matches(paths) => {
                let factory = StatLeaf::new(self.engine.filesystem(), NodeVariant::SearchResult);
                let first = self
                    .engine
                    .populate_from_paths(&mut self.tree, root, &paths, &factory)
                    .await;
                info!(
                    "Search below {} placed {} nodes",
                    self.tree.root_path().display(),
                    self.tree.len() - 1
                );
                Ok(first)
            }
            SearchOutcome::Failed(message) => {
                warn!("Search failed: {}", message);
                let placeholder = self.tree.root_path().join("search-error");
                let seed = NodeSeed::new(
                    EntryKind::File,
                    NodeVariant::Text {
                        text: message.clone(),
                    },
                );
                if let Err(error) = self.tree.create_child(root, placeholder, seed) {
                    warn!("{}", error);
                }
                Err(message)
            }
        }
    }

    /// Results are never rescanned from disk, so expanding only shows what
    /// the search placed.
    pub fn expand(&mut self, dir: NodeId) {
        self.tree.set_expanded(dir, true);
    }

    pub fn collapse(&mut self, dir: NodeId) {
        self.tree.set_expanded(dir, false);
    }
}
