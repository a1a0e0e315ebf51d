use std::path::Path;

use tracing::{debug, info, warn};

use crate::engine::{Engine, RefreshSummary, ScanSummary};
use crate::filesystem::{FilesystemProvider, WatchEvent, WatchService};
use crate::repository::{RepositoryRegistry, StatusProvider, apply_status, attach_registered};
use crate::scheduler::Host;
use crate::tree::{NodeId, NodeVariant, SortOrder, Tree, TreeError};

/// The directory tree of one root, loaded lazily as directories expand.
pub struct FilesystemView<F, W, H> {
    engine: Engine<F, W, H>,
    tree: Tree,
    repositories: RepositoryRegistry,
    status: Option<Box<dyn StatusProvider>>,
    hide_ignored: bool,
}

impl<F, W, H> FilesystemView<F, W, H>
where
    F: FilesystemProvider,
    W: WatchService,
    H: Host,
{
    pub fn new(engine: Engine<F, W, H>, root: impl AsRef<Path>) -> Self {
        Self {
            engine,
            tree: Tree::new(root, NodeVariant::Filesystem),
            repositories: RepositoryRegistry::new(),
            status: None,
            hide_ignored: false,
        }
    }

    pub fn with_sort_order(mut self, order: SortOrder) -> Self {
        self.set_sort_order(order);
        self
    }

    pub fn with_repositories(mut self, repositories: RepositoryRegistry) -> Self {
        self.repositories = repositories;
        self
    }

    /// Drops nodes the status provider reports as ignored.
    pub fn with_hide_ignored(mut self, hide_ignored: bool) -> Self {
        self.hide_ignored = hide_ignored;
        self
    }

    pub fn set_status_provider(&mut self, provider: Box<dyn StatusProvider>) {
        self.status = Some(provider);
        self.decorate(self.tree.root());
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.tree.set_comparator(order.comparator());
        self.tree.sort_loaded();
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn engine(&self) -> &Engine<F, W, H> {
        &self.engine
    }

    pub fn repositories(&self) -> &RepositoryRegistry {
        &self.repositories
    }

    /// Watches and scans the root, leaving it expanded.
    pub async fn open(&mut self) -> Result<ScanSummary, TreeError> {
        let root = self.tree.root();
        self.engine.watch(&mut self.tree, root);
        let summary = self.engine.scan_directory(&mut self.tree, root).await?;
        self.tree.set_expanded(root, true);
        self.decorate(root);
        info!(
            "Opened {} with {} entries",
            self.tree.root_path().display(),
            summary.added
        );
        Ok(summary)
    }

    pub async fn expand(&mut self, dir: NodeId) -> Result<(), TreeError> {
        let newly_watched = self.engine.watch(&mut self.tree, dir);
        self.engine.expand(&mut self.tree, dir).await?;
        if newly_watched {
            debug!("Watching {}", dir);
        }
        self.decorate(dir);
        Ok(())
    }

    pub fn collapse(&mut self, dir: NodeId) {
        self.engine.collapse(&mut self.tree, dir);
    }

    /// Expands every directory down to `depth` levels below the root.
    /// Directories that fail to list are skipped. Returns how many were expanded.
    pub async fn expand_to_depth(&mut self, depth: usize) -> usize {
        let mut frontier = vec![self.tree.root()];
        let mut expanded = 0;

        for _ in 0..depth {
            let mut next = Vec::new();
            for dir in frontier {
                if !self.tree.get(dir).is_some_and(|n| n.is_container()) {
                    continue;
                }
                match self.expand(dir).await {
                    Ok(()) => {
                        expanded += 1;
                        next.extend_from_slice(self.tree.children(dir));
                    }
                    Err(error) => warn!("{}", error),
                }
            }
            frontier = next;
        }
        expanded
    }

    pub async fn refresh(&mut self) -> RefreshSummary {
        let summary = self.engine.refresh(&mut self.tree).await;
        self.decorate(self.tree.root());
        summary
    }

    pub async fn reveal(&mut self, path: impl AsRef<Path>) -> Option<NodeId> {
        let revealed = self.engine.reveal(&mut self.tree, path).await;
        self.decorate(self.tree.root());
        revealed
    }

    pub async fn add(&mut self, path: impl AsRef<Path>) -> Option<NodeId> {
        let added = self.engine.add(&mut self.tree, path).await;
        self.decorate(self.tree.root());
        added
    }

    pub async fn remove(&mut self, path: impl AsRef<Path>, remove_empty_parents: bool) -> bool {
        let removed = self
            .engine
            .remove(&mut self.tree, path, remove_empty_parents)
            .await;
        if removed {
            self.decorate(self.tree.root());
        }
        removed
    }

    pub async fn handle_watch_event(
        &mut self,
        event: &WatchEvent,
    ) -> Result<Option<ScanSummary>, TreeError> {
        let summary = self.engine.on_watch_event(&mut self.tree, &event.path).await?;
        if summary.is_some() {
            self.decorate(self.tree.root());
        }
        Ok(summary)
    }

    // Repository ownership first, then status, since status is only read
    // for nodes that carry a repository.
    fn decorate(&mut self, start: NodeId) {
        if !self.repositories.is_empty() {
            attach_registered(&mut self.tree, &self.repositories);
        }
        let Some(provider) = self.status.as_deref() else {
            return;
        };
        apply_status(&mut self.tree, start, provider);

        if self.hide_ignored {
            let root = self.tree.root();
            let ignored: Vec<NodeId> = self
                .tree
                .walk(start)
                .filter(|id| *id != root && self.tree.get(*id).is_some_and(|n| n.is_ignored()))
                .collect();
            for id in ignored {
                if self.tree.contains(id) {
                    self.engine.discard(&mut self.tree, id);
                }
            }
        }
    }
}
