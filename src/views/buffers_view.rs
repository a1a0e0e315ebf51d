use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::engine::{Engine, LeafFactory, OpenBuffers};
use crate::ext::normalize_path;
use crate::filesystem::{FilesystemProvider, WatchService};
use crate::scheduler::Host;
use crate::tree::{EntryKind, NodeId, NodeSeed, NodeVariant, Tree, is_path_ancestor};

/// Open editor buffers arranged under the directory they have in common.
pub struct BuffersView<F, W, H> {
    engine: Engine<F, W, H>,
    tree: Tree,
    outside: Vec<PathBuf>,
}

impl<F, W, H> BuffersView<F, W, H>
where
    F: FilesystemProvider,
    W: WatchService,
    H: Host,
{
    /// `root` is used until the first set of buffers picks a better one.
    pub fn new(engine: Engine<F, W, H>, root: impl AsRef<Path>) -> Self {
        Self {
            engine,
            tree: Tree::new(root, NodeVariant::Buffer { bufnr: None }),
            outside: Vec::new(),
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Buffers left out of the last [`BuffersView::show`] because they do
    /// not share a filesystem root with the others.
    pub fn outside_root(&self) -> &[PathBuf] {
        &self.outside
    }

    /// Rebuilds the tree from `buffers`.
    ///
    /// The root becomes the deepest directory containing every buffer. When
    /// the buffers have no common directory at all, the previous root is
    /// kept and the buffers outside it are reported through
    /// [`BuffersView::outside_root`].
    pub async fn show(&mut self, buffers: OpenBuffers) -> NodeId {
        let previous = self.tree.root_path().to_path_buf();
        let root_path = match common_ancestor(buffers.paths()) {
            Some(common) => common,
            None => {
                debug!("Buffers share no directory, keeping {}", previous.display());
                previous
            }
        };

        self.outside = buffers
            .paths()
            .filter(|path| !is_path_ancestor(&root_path, path))
            .map(Path::to_path_buf)
            .collect();
        for path in &self.outside {
            warn!(
                "Buffer {} is outside {} and is not shown",
                path.display(),
                root_path.display()
            );
        }

        self.tree = Tree::new(&root_path, NodeVariant::Buffer { bufnr: None });
        let root = self.tree.root();
        self.tree.set_expanded(root, true);
        self.engine.set_open_buffers(buffers);

        let factory = BufferLeaf {
            fs: self.engine.filesystem(),
            buffers: self.engine.open_buffers(),
        };
        let paths: Vec<PathBuf> = self
            .engine
            .open_buffers()
            .paths()
            .map(Path::to_path_buf)
            .collect();
        self.engine
            .populate_from_paths(&mut self.tree, root, &paths, &factory)
            .await
    }
}

struct BufferLeaf<'a, F> {
    fs: &'a F,
    buffers: &'a OpenBuffers,
}

impl<F: FilesystemProvider> LeafFactory for BufferLeaf<'_, F> {
    // Buffers for files not yet written still get a node.
    async fn make_leaf(&self, path: &Path) -> Option<NodeSeed> {
        let state = self.buffers.get(path).copied().unwrap_or_default();
        let kind = match self.fs.stat(path).await {
            Some(entry) => entry.kind,
            None => EntryKind::File,
        };
        Some(
            NodeSeed::new(kind, NodeVariant::Buffer { bufnr: state.bufnr })
                .with_modified(state.modified),
        )
    }
}

/// Deepest directory strictly above every path.
///
/// `None` for an empty set, for relative paths, and for paths that do not
/// even share a filesystem root (e.g. two drive letters).
pub fn common_ancestor<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Option<PathBuf> {
    let mut paths = paths.into_iter().map(normalize_path);
    let first = paths.next()?;
    let mut common: Vec<Component> = first.parent()?.components().collect();

    for path in paths {
        let parent = path.parent()?;
        let shared = common
            .iter()
            .zip(parent.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }

    match common.first() {
        Some(Component::RootDir | Component::Prefix(_)) => Some(common.iter().collect()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BufferState;
    use crate::filesystem::NoopWatchService;
    use crate::filesystem::testing::MemoryFilesystem;
    use crate::scheduler::testing::CountingHost;
    use rstest::*;

    #[rstest]
    #[case(&["/p/src/a.rs", "/p/src/b.rs"], Some("/p/src"))]
    #[case(&["/p/src/a.rs", "/p/docs/b.md"], Some("/p"))]
    #[case(&["/p/src/a.rs"], Some("/p/src"))]
    #[case(&["/p/src", "/p/src/a.rs"], Some("/p"))]
    #[case(&["/a", "/b"], Some("/"))]
    #[case(&["relative/a"], None)]
    #[case(&[], None)]
    fn common_ancestor_of_paths(#[case] paths: &[&str], #[case] expected: Option<&str>) {
        let paths: Vec<&Path> = paths.iter().map(Path::new).collect();

        assert_eq!(common_ancestor(paths), expected.map(PathBuf::from));
    }

    fn buffer(bufnr: u32, modified: bool) -> BufferState {
        BufferState {
            bufnr: Some(bufnr),
            modified,
        }
    }

    #[compio::test]
    async fn buffers_are_placed_under_their_common_directory() {
        let fs = MemoryFilesystem::new().with_file("/p/src/lib.rs");
        let engine = Engine::new(&fs, NoopWatchService, CountingHost::default());
        let mut view = BuffersView::new(engine, "/home");

        let first = view
            .show(
                OpenBuffers::new()
                    .with("/p/src/lib.rs", buffer(1, false))
                    .with("/p/notes/todo.md", buffer(4, true)),
            )
            .await;

        let tree = view.tree();
        assert_eq!(tree.root_path(), Path::new("/p"));
        assert_eq!(tree.path(first), Some(Path::new("/p/notes/todo.md")));
        let todo = tree.get(first).unwrap();
        assert_eq!(todo.variant(), &NodeVariant::Buffer { bufnr: Some(4) });
        assert!(todo.is_modified());
        assert_eq!(todo.kind(), EntryKind::File);
        let notes = tree.find("/p/notes").unwrap();
        assert_eq!(tree.get(notes).unwrap().variant(), &NodeVariant::Buffer { bufnr: None });
        assert!(view.outside_root().is_empty());
    }

    #[compio::test]
    async fn relative_buffers_fall_back_to_the_previous_root() {
        let fs = MemoryFilesystem::new();
        let engine = Engine::new(&fs, NoopWatchService, CountingHost::default());
        let mut view = BuffersView::new(engine, "/home/me");

        view.show(
            OpenBuffers::new()
                .with("/home/me/a.txt", buffer(1, false))
                .with("scratch", buffer(2, false)),
        )
        .await;

        assert_eq!(view.tree().root_path(), Path::new("/home/me"));
        assert_eq!(view.outside_root(), &[PathBuf::from("scratch")]);
        assert!(view.tree().find("/home/me/a.txt").is_some());
    }
}
