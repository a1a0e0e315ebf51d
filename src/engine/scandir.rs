use std::path::PathBuf;

use hashlink::LinkedHashMap;
use snafu::ResultExt;
use tracing::{debug, info, warn};

use super::Engine;
use crate::filesystem::{FilesystemProvider, WatchService};
use crate::scheduler::Host;
use crate::tree::{
    EntryKind, ListingFailedSnafu, NodeId, StructuralViolationSnafu, Tree, TreeError,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub scanned: usize,
    pub failures: Vec<TreeError>,
}

impl<F, W, H> Engine<F, W, H>
where
    F: FilesystemProvider,
    W: WatchService,
    H: Host,
{
    /// Re-lists `dir` and merges the listing into its children.
    ///
    /// Children whose path is still listed keep their id; only their scalar
    /// fields are refreshed. A failed listing leaves the directory untouched.
    pub async fn scan_directory(
        &self,
        tree: &mut Tree,
        dir: NodeId,
    ) -> Result<ScanSummary, TreeError> {
        let node = tree.node(dir)?;
        let path = node.path.clone();
        if !node.is_container() {
            return StructuralViolationSnafu {
                path: path.clone(),
                parent: path,
            }
            .fail();
        }
        let watched = node.watcher_registered;
        let variant = Self::child_variant(tree, dir);

        let mut previous: LinkedHashMap<PathBuf, NodeId> = tree
            .children(dir)
            .iter()
            .filter_map(|id| tree.path(*id).map(|p| (p.to_path_buf(), *id)))
            .collect();

        debug!("Listing {}", path.display());
        let listing = match self.fs.list(&path).await {
            Ok(listing) => listing,
            Err(error) => {
                warn!("Failed to list {}: {}", path.display(), error);
                return Err(error).context(ListingFailedSnafu { path });
            }
        };

        let mut summary = ScanSummary::default();
        let mut children = Vec::with_capacity(listing.len());

        for entry in listing.into_iter().filter(|e| self.filter.accepts(e)) {
            let child_path = path.join(&entry.name);
            let seed = entry.seed(variant.clone());

            if let Some(existing) = previous.remove(&child_path) {
                let same_shape = tree
                    .get(existing)
                    .is_some_and(|n| is_dir(n.kind) == is_dir(seed.kind));
                if same_shape {
                    if let Some(node) = tree.get_mut(existing) {
                        node.merge_seed(seed);
                    }
                    children.push(existing);
                    summary.updated += 1;
                    continue;
                }
                debug!("{} changed kind, replacing its node", child_path.display());
                let released = tree.free_subtree(existing);
                self.release_watches(released);
                summary.removed += 1;
            }

            match tree.alloc(dir, child_path, seed) {
                Ok(id) => {
                    if watched {
                        self.watch(tree, id);
                    }
                    children.push(id);
                    summary.added += 1;
                }
                Err(error) => warn!("Skipping listed entry: {}", error),
            }
        }

        tree.replace_children(dir, children)?;
        tree.node_mut(dir)?.scanned = true;

        for (gone_path, gone) in previous {
            debug!("{} disappeared", gone_path.display());
            let released = tree.free_subtree(gone);
            self.release_watches(released);
            summary.removed += 1;
        }

        self.apply_buffer_overlay(tree, dir);

        debug!(
            "Scanned {}: {} added, {} updated, {} removed",
            path.display(),
            summary.added,
            summary.updated,
            summary.removed
        );
        self.host.yield_now().await;
        Ok(summary)
    }

    /// Loads `dir` if it was never scanned and marks it expanded.
    pub async fn expand(&self, tree: &mut Tree, dir: NodeId) -> Result<(), TreeError> {
        if !tree.node(dir)?.scanned {
            self.scan_directory(tree, dir).await?;
        }
        tree.set_expanded(dir, true);
        Ok(())
    }

    pub fn collapse(&self, tree: &mut Tree, dir: NodeId) {
        tree.set_expanded(dir, false);
    }

    /// Rescans the root and every expanded, already scanned directory,
    /// parents before children. Directories removed by an earlier rescan in
    /// the same pass are skipped.
    pub async fn refresh(&self, tree: &mut Tree) -> RefreshSummary {
        let root = tree.root();
        let targets: Vec<NodeId> = tree
            .walk(root)
            .filter(|id| {
                tree.get(*id)
                    .is_some_and(|n| n.scanned && (*id == root || n.expanded))
            })
            .collect();

        let mut summary = RefreshSummary::default();
        for id in targets {
            if !tree.contains(id) {
                continue;
            }
            match self.scan_directory(tree, id).await {
                Ok(_) => summary.scanned += 1,
                Err(error) => summary.failures.push(error),
            }
        }

        info!(
            "Refreshed {} directories under {} ({} failures)",
            summary.scanned,
            tree.root_path().display(),
            summary.failures.len()
        );
        summary
    }
}

fn is_dir(kind: EntryKind) -> bool {
    kind == EntryKind::Directory
}
