use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use super::Engine;
use crate::ext::normalize_path;
use crate::filesystem::{FilesystemProvider, WatchService};
use crate::scheduler::Host;
use crate::tree::{NodeId, NodeSeed, NodeVariant, StructuralViolationSnafu, Tree, is_path_ancestor};

/// Produces the terminal node for one path of a path set.
pub trait LeafFactory {
    /// `None` skips the path, e.g. because it no longer exists.
    async fn make_leaf(&self, path: &Path) -> Option<NodeSeed>;
}

impl<T> LeafFactory for T
where
    T: Fn(&Path) -> Option<NodeSeed>,
{
    async fn make_leaf(&self, path: &Path) -> Option<NodeSeed> {
        self(path)
    }
}

/// Leaf factory that describes each path through the filesystem provider.
pub struct StatLeaf<'a, F> {
    fs: &'a F,
    variant: NodeVariant,
}

impl<'a, F: FilesystemProvider> StatLeaf<'a, F> {
    pub fn new(fs: &'a F, variant: NodeVariant) -> Self {
        Self { fs, variant }
    }
}

impl<F: FilesystemProvider> LeafFactory for StatLeaf<'_, F> {
    async fn make_leaf(&self, path: &Path) -> Option<NodeSeed> {
        match self.fs.stat(path).await {
            Some(entry) => Some(entry.seed(self.variant.clone())),
            None => {
                debug!("{} vanished before it could be placed", path.display());
                None
            }
        }
    }
}

impl<F, W, H> Engine<F, W, H>
where
    F: FilesystemProvider,
    W: WatchService,
    H: Host,
{
    /// Grows the subtree below `root` so it holds every path of `paths`.
    ///
    /// Missing directories in between are synthesized expanded. Paths outside
    /// `root`, the root path itself and paths already present are skipped.
    /// Returns the first leaf below `root`, or `root` when it stays childless.
    pub async fn populate_from_paths<P, L>(
        &self,
        tree: &mut Tree,
        root: NodeId,
        paths: impl IntoIterator<Item = P>,
        factory: &L,
    ) -> NodeId
    where
        P: AsRef<Path>,
        L: LeafFactory,
    {
        let Some(root_node) = tree.get(root) else {
            warn!("Cannot populate stale node {}", root);
            return root;
        };
        let root_path = root_node.path().to_path_buf();
        if !root_node.is_container() {
            error!("Cannot populate {}: not a container", root_path.display());
            return root;
        }

        let mut wanted: Vec<PathBuf> = paths
            .into_iter()
            .map(|path| normalize_path(path.as_ref()))
            .filter(|path| is_path_ancestor(&root_path, path))
            .collect();
        wanted.sort();
        wanted.dedup();

        let mut placed = 0usize;
        for path in wanted {
            if tree.find(&path).is_some() {
                continue;
            }
            let Some(mut seed) = factory.make_leaf(&path).await else {
                continue;
            };
            let Some(parent) = self.synthesize_ancestors(tree, root, &root_path, &path) else {
                continue;
            };
            seed.modified |= self.buffers.is_modified(&path);

            match tree.create_child(parent, path, seed) {
                Ok(_) => placed += 1,
                Err(error) => error!("{}", error),
            }
        }

        tree.sort_recursive(root);
        debug!("Placed {} paths under {}", placed, root_path.display());
        if placed > 0 {
            self.host.yield_now().await;
        }
        tree.first_leaf(root)
    }

    /// Makes sure every directory between `root` and `path` exists and
    /// returns the deepest one.
    fn synthesize_ancestors(
        &self,
        tree: &mut Tree,
        root: NodeId,
        root_path: &Path,
        path: &Path,
    ) -> Option<NodeId> {
        let relative = path.strip_prefix(root_path).ok()?;
        let mut components: Vec<_> = relative.components().collect();
        components.pop();

        let mut parent = root;
        let mut current = root_path.to_path_buf();
        for component in components {
            current.push(component);
            parent = match tree.find(&current) {
                Some(existing) if tree.get(existing).is_some_and(|n| n.is_container()) => existing,
                Some(_) => {
                    let violation = StructuralViolationSnafu {
                        path: path.to_path_buf(),
                        parent: current,
                    }
                    .build();
                    error!("{}", violation);
                    return None;
                }
                None => {
                    let seed = NodeSeed::directory(Self::child_variant(tree, parent));
                    let id = match tree.create_child(parent, current.clone(), seed) {
                        Ok(id) => id,
                        Err(error) => {
                            error!("{}", error);
                            return None;
                        }
                    };
                    if let Some(node) = tree.get_mut(id) {
                        node.children = Some(Vec::new());
                        node.expanded = true;
                    }
                    id
                }
            };
        }
        Some(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BufferState, OpenBuffers};
    use crate::filesystem::NoopWatchService;
    use crate::filesystem::testing::MemoryFilesystem;
    use crate::scheduler::testing::CountingHost;
    use crate::tree::EntryKind;

    fn search_leaf(_: &Path) -> Option<NodeSeed> {
        Some(NodeSeed::file(NodeVariant::SearchResult))
    }

    fn shape(tree: &Tree) -> Vec<(usize, String)> {
        tree.outline()
            .iter()
            .map(|line| (line.depth, tree.get(line.id).unwrap().name().to_string()))
            .collect()
    }

    fn engine(fs: &MemoryFilesystem) -> Engine<&MemoryFilesystem, NoopWatchService, CountingHost> {
        Engine::new(fs, NoopWatchService, CountingHost::default())
    }

    #[compio::test]
    async fn synthesizes_one_directory_for_siblings() {
        let fs = MemoryFilesystem::new();
        let engine = engine(&fs);
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();

        let first = engine
            .populate_from_paths(&mut tree, root, ["/a/b/d.txt", "/a/b/c.txt"], &search_leaf)
            .await;

        assert_eq!(tree.len(), 4);
        let b = tree.find("/a/b").unwrap();
        let node = tree.get(b).unwrap();
        assert!(node.is_container());
        assert!(node.is_expanded());
        assert!(!node.is_scanned());
        assert_eq!(
            shape(&tree),
            vec![
                (0, "a".to_string()),
                (1, "b".to_string()),
                (2, "c.txt".to_string()),
                (2, "d.txt".to_string()),
            ]
        );
        assert_eq!(first, tree.find("/a/b/c.txt").unwrap());
        assert_eq!(
            tree.get(first).unwrap().variant(),
            &NodeVariant::SearchResult
        );
    }

    #[compio::test]
    async fn repeated_paths_are_idempotent() {
        let fs = MemoryFilesystem::new();
        let engine = engine(&fs);
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();
        let paths = ["/a/x/1", "/a/x/1", "/a/x/./2"];

        engine.populate_from_paths(&mut tree, root, paths, &search_leaf).await;
        let before: Vec<NodeId> = tree.walk(root).collect();
        engine.populate_from_paths(&mut tree, root, paths, &search_leaf).await;

        assert_eq!(tree.walk(root).collect::<Vec<_>>(), before);
        assert_eq!(tree.len(), 4);
        assert_eq!(engine.host().yields(), 1);
    }

    #[compio::test]
    async fn input_order_does_not_matter() {
        let fs = MemoryFilesystem::new();
        let engine = engine(&fs);
        let paths = vec!["/r/src/lib.rs", "/r/Cargo.toml", "/r/src/bin/main.rs", "/r/docs/a.md"];
        let mut reversed = paths.clone();
        reversed.reverse();

        let mut forward = Tree::new("/r", NodeVariant::Filesystem);
        let root = forward.root();
        engine.populate_from_paths(&mut forward, root, &paths, &search_leaf).await;
        let mut backward = Tree::new("/r", NodeVariant::Filesystem);
        let root = backward.root();
        engine.populate_from_paths(&mut backward, root, &reversed, &search_leaf).await;

        assert_eq!(shape(&forward), shape(&backward));
        assert_eq!(
            shape(&forward)[1..3],
            [(1, "docs".to_string()), (2, "a.md".to_string())]
        );
    }

    #[compio::test]
    async fn paths_outside_or_at_the_root_are_ignored() {
        let fs = MemoryFilesystem::new();
        let engine = engine(&fs);
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();

        let first = engine
            .populate_from_paths(
                &mut tree,
                root,
                ["/a", "/ab/c", "/b/x", "/a/../b/y"],
                &search_leaf,
            )
            .await;

        assert_eq!(first, root);
        assert_eq!(tree.len(), 1);
        assert!(tree.get(root).unwrap().children().is_none());
    }

    #[compio::test]
    async fn skipped_leaves_leave_no_directories_behind() {
        let fs = MemoryFilesystem::new();
        let engine = engine(&fs);
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();
        let only_rust = |path: &Path| {
            path.extension()
                .is_some_and(|e| e == "rs")
                .then(|| NodeSeed::file(NodeVariant::SearchResult))
        };

        engine
            .populate_from_paths(&mut tree, root, ["/a/docs/x.md", "/a/src/lib.rs"], &only_rust)
            .await;

        assert!(tree.find("/a/docs").is_none());
        assert!(tree.find("/a/src/lib.rs").is_some());
    }

    #[compio::test]
    async fn stat_leaf_skips_missing_paths() {
        let fs = MemoryFilesystem::new()
            .with_file("/a/here.txt")
            .with_dir("/a/dir");
        let engine = engine(&fs);
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();
        let factory = StatLeaf::new(&fs, NodeVariant::SearchResult);

        engine
            .populate_from_paths(
                &mut tree,
                root,
                ["/a/here.txt", "/a/gone.txt", "/a/dir"],
                &factory,
            )
            .await;

        assert!(tree.find("/a/gone.txt").is_none());
        let dir = tree.find("/a/dir").unwrap();
        assert_eq!(tree.get(dir).unwrap().kind(), EntryKind::Directory);
        assert_eq!(tree.len(), 3);
    }

    #[compio::test]
    async fn leaf_under_a_file_is_rejected() {
        let fs = MemoryFilesystem::new();
        let engine = engine(&fs);
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();

        engine
            .populate_from_paths(&mut tree, root, ["/a/f", "/a/f/inner", "/a/g"], &search_leaf)
            .await;

        assert!(tree.find("/a/f/inner").is_none());
        assert!(tree.find("/a/g").is_some());
        assert_eq!(tree.len(), 3);
    }

    #[compio::test]
    async fn open_buffers_mark_leaves_modified() {
        let fs = MemoryFilesystem::new();
        let mut engine = engine(&fs);
        engine.set_open_buffers(OpenBuffers::new().with(
            "/a/edited.rs",
            BufferState {
                bufnr: None,
                modified: true,
            },
        ));
        let mut tree = Tree::new("/a", NodeVariant::Filesystem);
        let root = tree.root();

        engine
            .populate_from_paths(&mut tree, root, ["/a/edited.rs", "/a/other.rs"], &search_leaf)
            .await;

        let edited = tree.find("/a/edited.rs").unwrap();
        let other = tree.find("/a/other.rs").unwrap();
        assert!(tree.get(edited).unwrap().is_modified());
        assert!(!tree.get(other).unwrap().is_modified());
    }
}
