use std::path::Path;

use tracing::{debug, error, warn};

use super::{Engine, ScanSummary};
use crate::ext::normalize_path;
use crate::filesystem::{FilesystemProvider, WatchService};
use crate::scheduler::Host;
use crate::tree::{
    NodeId, NotFoundSnafu, OutsideRootSnafu, StructuralViolationSnafu, Tree, TreeError,
    is_path_ancestor,
};

impl<F, W, H> Engine<F, W, H>
where
    F: FilesystemProvider,
    W: WatchService,
    H: Host,
{
    /// Loads `path` and every missing directory above it, one stat per
    /// missing component. Already loaded components are reused.
    pub async fn add(&self, tree: &mut Tree, path: impl AsRef<Path>) -> Option<NodeId> {
        let path = normalize_path(path.as_ref());
        let root_path = tree.root_path().to_path_buf();
        if path == root_path {
            return Some(tree.root());
        }
        if !is_path_ancestor(&root_path, &path) {
            warn!("{}", OutsideRootSnafu { path, root: root_path }.build());
            return None;
        }
        let relative = path.strip_prefix(&root_path).ok()?.to_path_buf();

        let mut parent = tree.root();
        let mut current = root_path;
        let mut created = false;
        for component in relative.components() {
            current.push(component);
            if let Some(existing) = tree.find(&current) {
                parent = existing;
                continue;
            }

            let parent_node = tree.get(parent)?;
            if !parent_node.is_container() {
                let violation = StructuralViolationSnafu {
                    path: current,
                    parent: parent_node.path().to_path_buf(),
                }
                .build();
                error!("{}", violation);
                return None;
            }
            let watched = parent_node.is_watched();

            let Some(entry) = self.fs.stat(&current).await else {
                warn!("{}", NotFoundSnafu { path: current }.build());
                return None;
            };
            let seed = entry
                .seed(Self::child_variant(tree, parent))
                .with_modified(self.buffers.is_modified(&current));

            parent = match tree.create_child(parent, current.clone(), seed) {
                Ok(id) => id,
                Err(error) => {
                    error!("{}", error);
                    return None;
                }
            };
            if watched {
                self.watch(tree, parent);
            }
            created = true;
        }

        if created {
            debug!("Added {}", path.display());
            self.host.yield_now().await;
        }
        Some(parent)
    }

    /// Drops the loaded node at `path`. Never scans and never removes the
    /// root. With `remove_empty_parents`, directories left empty are pruned
    /// upward until one still has children.
    pub async fn remove(
        &self,
        tree: &mut Tree,
        path: impl AsRef<Path>,
        remove_empty_parents: bool,
    ) -> bool {
        let path = normalize_path(path.as_ref());
        let Some(id) = tree.find(&path) else {
            debug!("{} is not loaded, nothing to remove", path.display());
            return false;
        };
        if id == tree.root() {
            warn!("Refusing to remove tree root {}", path.display());
            return false;
        }

        let mut parent = tree.parent(id);
        self.discard(tree, id);

        if remove_empty_parents {
            while let Some(dir) = parent {
                let prunable = dir != tree.root() && tree.get(dir).is_some_and(|n| n.is_empty());
                if !prunable {
                    break;
                }
                parent = tree.parent(dir);
                if let Some(empty) = tree.path(dir) {
                    debug!("Pruning empty directory {}", empty.display());
                }
                self.discard(tree, dir);
            }
        }

        self.host.yield_now().await;
        true
    }

    /// Loads `path` and expands every directory above it, scanning those
    /// that were never listed so the node shows up among its siblings.
    pub async fn reveal(&self, tree: &mut Tree, path: impl AsRef<Path>) -> Option<NodeId> {
        let path = normalize_path(path.as_ref());
        let target = self.add(tree, &path).await?;

        let mut chain: Vec<NodeId> = tree.ancestors(target).collect();
        chain.reverse();
        for dir in chain {
            if let Err(error) = self.expand(tree, dir).await {
                warn!("Could not expand towards {}: {}", path.display(), error);
            }
        }

        // A filtered entry disappears when its directory is scanned.
        match tree.find(&path) {
            Some(id) => Some(id),
            None => self.add(tree, &path).await,
        }
    }

    /// Rescans the nearest loaded and scanned directory that contains
    /// `path`. Events for paths the tree never loaded are ignored.
    pub async fn on_watch_event(
        &self,
        tree: &mut Tree,
        path: impl AsRef<Path>,
    ) -> Result<Option<ScanSummary>, TreeError> {
        let path = normalize_path(path.as_ref());
        let target = if path == tree.root_path() {
            Some(tree.root())
        } else {
            path.ancestors().skip(1).find_map(|ancestor| {
                tree.find(ancestor)
                    .filter(|id| tree.get(*id).is_some_and(|n| n.is_container() && n.is_scanned()))
            })
        };

        match target {
            Some(dir) => self.scan_directory(tree, dir).await.map(Some),
            None => {
                debug!("Ignoring change at {}", path.display());
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BufferState, OpenBuffers};
    use crate::filesystem::testing::{MemoryFilesystem, RecordingWatchService};
    use crate::scheduler::testing::CountingHost;
    use crate::tree::{EntryKind, NodeVariant};

    fn names(tree: &Tree, id: NodeId) -> Vec<String> {
        tree.children(id)
            .iter()
            .map(|c| tree.get(*c).unwrap().name().to_string())
            .collect()
    }

    #[compio::test]
    async fn add_resolves_missing_components() {
        let fs = MemoryFilesystem::new().with_file("/a/src/deep/mod.rs");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);

        let id = engine.add(&mut tree, "/a/src/deep/mod.rs").await.unwrap();

        assert_eq!(tree.path(id), Some(Path::new("/a/src/deep/mod.rs")));
        let deep = tree.find("/a/src/deep").unwrap();
        assert_eq!(tree.parent(id), Some(deep));
        assert!(!tree.get(deep).unwrap().is_empty());
        assert_eq!(tree.get(deep).unwrap().kind(), EntryKind::Directory);
        assert_eq!(engine.host().yields(), 1);
    }

    #[compio::test]
    async fn add_reuses_loaded_nodes_and_keeps_order() {
        let fs = MemoryFilesystem::new()
            .with_file("/a/b.txt")
            .with_dir("/a/src");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();
        engine.scan_directory(&mut tree, root).await.unwrap();
        let src = tree.find("/a/src").unwrap();

        fs.add("/a/a.txt", EntryKind::File);
        fs.add("/a/src/lib.rs", EntryKind::File);
        engine.add(&mut tree, "/a/a.txt").await.unwrap();
        let lib = engine.add(&mut tree, "/a/src/lib.rs").await.unwrap();

        assert_eq!(names(&tree, root), vec!["src", "a.txt", "b.txt"]);
        assert_eq!(tree.parent(lib), Some(src));
        let again = engine.add(&mut tree, "/a/src/lib.rs").await;
        assert_eq!(again, Some(lib));
    }

    #[compio::test]
    async fn add_fails_for_missing_or_foreign_paths() {
        let fs = MemoryFilesystem::new().with_file("/a/file");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);

        assert!(engine.add(&mut tree, "/a/missing").await.is_none());
        assert!(engine.add(&mut tree, "/elsewhere/file").await.is_none());
        let root = engine.add(&mut tree, "/a").await;
        assert_eq!(root, Some(tree.root()));
        assert_eq!(tree.len(), 1);
    }

    #[compio::test]
    async fn add_below_a_file_is_a_structural_violation() {
        let fs = MemoryFilesystem::new().with_file("/a/file");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        engine.add(&mut tree, "/a/file").await.unwrap();

        assert!(engine.add(&mut tree, "/a/file/child").await.is_none());
        assert_eq!(tree.len(), 2);
    }

    #[compio::test]
    async fn add_applies_buffer_overlay_and_watches() {
        let fs = MemoryFilesystem::new().with_file("/a/sub/dirty.rs");
        let watcher = RecordingWatchService::default();
        let mut engine = Engine::new(&fs, &watcher, CountingHost::default()).with_watching(true);
        engine.set_open_buffers(OpenBuffers::new().with(
            "/a/sub/dirty.rs",
            BufferState {
                bufnr: Some(2),
                modified: true,
            },
        ));
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();
        engine.watch(&mut tree, root);

        let id = engine.add(&mut tree, "/a/sub/dirty.rs").await.unwrap();

        assert!(tree.get(id).unwrap().is_modified());
        assert!(watcher.is_watched("/a/sub"));
        assert!(!watcher.is_watched("/a/sub/dirty.rs"));
    }

    #[compio::test]
    async fn remove_prunes_empty_parents_up_to_a_sibling() {
        let fs = MemoryFilesystem::new()
            .with_file("/a/keep.txt")
            .with_file("/a/b/c/d/leaf.txt");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();
        engine.add(&mut tree, "/a/keep.txt").await.unwrap();
        engine.add(&mut tree, "/a/b/c/d/leaf.txt").await.unwrap();

        assert!(engine.remove(&mut tree, "/a/b/c/d/leaf.txt", true).await);

        assert!(tree.find("/a/b").is_none());
        assert!(tree.find("/a/b/c/d").is_none());
        assert_eq!(names(&tree, root), vec!["keep.txt"]);
    }

    #[compio::test]
    async fn remove_stops_at_the_root() {
        let fs = MemoryFilesystem::new().with_file("/a/b/only.txt");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();
        engine.add(&mut tree, "/a/b/only.txt").await.unwrap();

        assert!(engine.remove(&mut tree, "/a/b/only.txt", true).await);

        assert!(tree.contains(root));
        assert!(tree.get(root).unwrap().is_empty());
        assert!(!engine.remove(&mut tree, "/a", true).await);
    }

    #[compio::test]
    async fn remove_without_pruning_flags_parent_empty() {
        let fs = MemoryFilesystem::new().with_file("/a/b/only.txt");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        engine.add(&mut tree, "/a/b/only.txt").await.unwrap();

        assert!(engine.remove(&mut tree, "/a/b/only.txt", false).await);

        let b = tree.find("/a/b").unwrap();
        assert!(tree.get(b).unwrap().is_empty());
    }

    #[compio::test]
    async fn removing_unloaded_paths_is_a_no_op() {
        let fs = MemoryFilesystem::new().with_file("/a/x");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);

        assert!(!engine.remove(&mut tree, "/a/x", true).await);
        assert_eq!(fs.list_calls(), 0);
        assert_eq!(engine.host().yields(), 0);
    }

    #[compio::test]
    async fn remove_releases_watches_of_the_subtree() {
        let fs = MemoryFilesystem::new().with_dir("/a/d/e");
        let watcher = RecordingWatchService::default();
        let engine = Engine::new(&fs, &watcher, CountingHost::default()).with_watching(true);
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();
        engine.watch(&mut tree, root);
        engine.add(&mut tree, "/a/d/e").await.unwrap();
        assert!(watcher.is_watched("/a/d/e"));

        engine.remove(&mut tree, "/a/d", false).await;

        assert_eq!(watcher.active(), 1);
        assert!(watcher.is_balanced());
    }

    #[compio::test]
    async fn reveal_expands_and_loads_siblings() {
        let fs = MemoryFilesystem::new()
            .with_file("/a/src/engine/scan.rs")
            .with_file("/a/src/engine/mod.rs")
            .with_file("/a/src/lib.rs")
            .with_file("/a/README.md");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();

        let id = engine.reveal(&mut tree, "/a/src/engine/scan.rs").await.unwrap();

        let src = tree.find("/a/src").unwrap();
        let engine_dir = tree.find("/a/src/engine").unwrap();
        assert!(tree.get(src).unwrap().is_expanded());
        assert!(tree.get(engine_dir).unwrap().is_expanded());
        assert_eq!(names(&tree, root), vec!["src", "README.md"]);
        assert_eq!(names(&tree, engine_dir), vec!["mod.rs", "scan.rs"]);
        assert_eq!(tree.find("/a/src/engine/scan.rs"), Some(id));
    }

    #[compio::test]
    async fn watch_event_rescans_containing_directory() {
        let fs = MemoryFilesystem::new().with_dir("/a/sub");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();
        engine.scan_directory(&mut tree, root).await.unwrap();
        let sub = tree.find("/a/sub").unwrap();
        engine.expand(&mut tree, sub).await.unwrap();

        fs.add("/a/sub/new.txt", EntryKind::File);
        let summary = engine
            .on_watch_event(&mut tree, "/a/sub/new.txt")
            .await
            .unwrap();

        assert_eq!(summary.map(|s| s.added), Some(1));
        assert!(tree.find("/a/sub/new.txt").is_some());
    }

    #[compio::test]
    async fn watch_event_outside_loaded_tree_is_ignored() {
        let fs = MemoryFilesystem::new().with_dir("/a/sub");
        let engine = Engine::new(&fs, RecordingWatchService::default(), CountingHost::default());
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);

        let summary = engine.on_watch_event(&mut tree, "/b/x").await.unwrap();

        assert!(summary.is_none());
        assert_eq!(fs.list_calls(), 0);
    }
}
