use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{DuplicatePathSnafu, StaleNodeSnafu, StructuralViolationSnafu};
use super::{
    ClipboardStatus, Comparator, DirectoriesFirst, Node, NodeId, NodeSeed, NodeVariant, TreeError,
    is_path_ancestor,
};
use crate::ext::normalize_path;

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena that owns every node of one view.
///
/// Children lists are the only ownership edges; parents are plain ids.
/// Every node is also reachable through a path index, which is how path
/// uniqueness is enforced.
pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    index: HashMap<PathBuf, NodeId>,
    comparator: Box<dyn Comparator>,
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.root_path())
            .field("nodes", &self.index.len())
            .finish()
    }
}

impl Tree {
    /// Creates a tree holding a single unscanned directory root.
    pub fn new(root_path: impl AsRef<Path>, variant: NodeVariant) -> Self {
        Self::with_root(root_path, NodeSeed::directory(variant))
    }

    pub fn with_root(root_path: impl AsRef<Path>, seed: NodeSeed) -> Self {
        let path = normalize_path(root_path.as_ref());
        let root = NodeId {
            index: 0,
            generation: 0,
        };
        let node = Node::from_seed(path.clone(), seed);

        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(node),
            }],
            free: Vec::new(),
            root,
            index: HashMap::from([(path, root)]),
            comparator: Box::new(DirectoriesFirst),
        }
    }

    pub fn with_comparator(mut self, comparator: Box<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Swaps the sibling order. Already loaded levels keep their order until
    /// [`Tree::sort_loaded`] is called.
    pub fn set_comparator(&mut self, comparator: Box<dyn Comparator>) {
        self.comparator = comparator;
    }

    pub fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => self.comparator.compare(a, b),
            _ => a.cmp(&b),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_path(&self) -> &Path {
        self.get(self.root)
            .map(Node::path)
            .unwrap_or_else(|| Path::new(""))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.get(id).ok_or_else(|| StaleNodeSnafu { id }.build())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.get_mut(id).ok_or_else(|| StaleNodeSnafu { id }.build())
    }

    /// Looks up an already loaded node; never touches the filesystem.
    pub fn find(&self, path: impl AsRef<Path>) -> Option<NodeId> {
        self.index.get(path.as_ref()).copied()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).and_then(Node::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    pub fn path(&self, id: NodeId) -> Option<&Path> {
        self.get(id).map(Node::path)
    }

    pub fn is_ancestor_of(&self, id: NodeId, path: impl AsRef<Path>) -> bool {
        self.get(id).is_some_and(|node| node.is_ancestor_of(path.as_ref()))
    }

    /// Ids from `id`'s parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Pre-order walk over `id` and every loaded descendant.
    pub fn walk(&self, id: NodeId) -> Walk<'_> {
        let stack = if self.contains(id) { vec![id] } else { Vec::new() };
        Walk { tree: self, stack }
    }

    /// Descends through first children until reaching a node without any.
    pub fn first_leaf(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(first) = self.children(current).first() {
            current = *first;
        }
        current
    }

    /// Directories whose children are present, in pre-order.
    pub fn loaded_directories(&self) -> Vec<NodeId> {
        self.walk(self.root)
            .filter(|id| self.get(*id).is_some_and(|n| n.children.is_some()))
            .collect()
    }

    /// Registers a new node under `parent` without placing it in the
    /// parent's children list. The node inherits the parent's repository.
    pub(crate) fn alloc(
        &mut self,
        parent: NodeId,
        path: PathBuf,
        seed: NodeSeed,
    ) -> Result<NodeId, TreeError> {
        let parent_node = self.node(parent)?;
        if !parent_node.is_container() || !is_path_ancestor(&parent_node.path, &path) {
            return StructuralViolationSnafu {
                path,
                parent: parent_node.path.clone(),
            }
            .fail();
        }
        if self.index.contains_key(&path) {
            return DuplicatePathSnafu { path }.fail();
        }
        let repo = parent_node.repo.clone();

        let mut node = Node::from_seed(path.clone(), seed);
        node.parent = Some(parent);
        node.repo = repo;

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        };
        self.index.insert(path, id);
        Ok(id)
    }

    /// Places `child` among its parent's children at the comparator's position.
    pub(crate) fn insert_sorted(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let mut children = self.node_mut(parent)?.children.take().unwrap_or_default();
        let position = children
            .binary_search_by(|probe| self.compare(*probe, child))
            .unwrap_or_else(|position| position);
        children.insert(position, child);
        self.node_mut(parent)?.children = Some(children);
        Ok(())
    }

    /// Allocates and inserts in one step.
    pub(crate) fn create_child(
        &mut self,
        parent: NodeId,
        path: PathBuf,
        seed: NodeSeed,
    ) -> Result<NodeId, TreeError> {
        let id = self.alloc(parent, path, seed)?;
        self.insert_sorted(parent, id)?;
        Ok(id)
    }

    pub(crate) fn replace_children(
        &mut self,
        parent: NodeId,
        children: Vec<NodeId>,
    ) -> Result<(), TreeError> {
        self.node_mut(parent)?.children = Some(children);
        self.sort_children(parent);
        Ok(())
    }

    /// Unlinks `id` from its parent's children. The node stays allocated.
    pub(crate) fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            if let Some(children) = self.get_mut(parent).and_then(|p| p.children.as_mut()) {
                children.retain(|child| *child != id);
            }
        }
    }

    /// Drops `id` and all of its descendants. Returns the paths that still
    /// had a watch registered so the caller can release them.
    pub(crate) fn free_subtree(&mut self, id: NodeId) -> Vec<PathBuf> {
        let doomed: Vec<NodeId> = self.walk(id).collect();
        let mut watched = Vec::new();

        for id in doomed {
            let Some(slot) = self.slots.get_mut(id.index as usize) else {
                continue;
            };
            if slot.generation != id.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                if node.watcher_registered {
                    watched.push(node.path.clone());
                }
                self.index.remove(&node.path);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }

        watched
    }

    pub fn sort_children(&mut self, id: NodeId) {
        let Some(mut children) = self.get_mut(id).and_then(|n| n.children.take()) else {
            return;
        };
        children.sort_by(|a, b| self.compare(*a, *b));
        if let Some(node) = self.get_mut(id) {
            node.children = Some(children);
        }
    }

    pub fn sort_recursive(&mut self, id: NodeId) {
        let directories: Vec<NodeId> = self
            .walk(id)
            .filter(|id| self.get(*id).is_some_and(|n| n.children.is_some()))
            .collect();
        for directory in directories {
            self.sort_children(directory);
        }
    }

    /// Re-sorts every loaded level with the current comparator.
    pub fn sort_loaded(&mut self) {
        self.sort_recursive(self.root);
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        if let Some(node) = self.get_mut(id) {
            if node.is_container() {
                node.expanded = expanded;
            }
        }
    }

    pub fn set_modified(&mut self, id: NodeId, modified: bool) {
        if let Some(node) = self.get_mut(id) {
            node.modified = modified;
        }
    }

    /// Marks `id` and its loaded descendants for copy or cut.
    pub fn set_clipboard(&mut self, id: NodeId, status: ClipboardStatus) {
        self.write_clipboard(id, Some(status));
    }

    pub fn clear_clipboard(&mut self, id: NodeId) {
        self.write_clipboard(id, None);
    }

    fn write_clipboard(&mut self, id: NodeId, status: Option<ClipboardStatus>) {
        let targets: Vec<NodeId> = self.walk(id).collect();
        debug!("Setting clipboard {:?} on {} nodes", status, targets.len());
        for target in targets {
            if let Some(node) = self.get_mut(target) {
                node.clipboard = status;
            }
        }
    }

    /// Lines a view would show: the root, then children of expanded containers.
    pub fn outline(&self) -> Vec<OutlineLine> {
        let mut lines = Vec::new();
        let mut stack = vec![(self.root, 0usize)];

        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            lines.push(OutlineLine { id, depth });
            if id == self.root || node.expanded {
                for child in self.children(id).iter().rev() {
                    stack.push((*child, depth + 1));
                }
            }
        }

        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineLine {
    pub id: NodeId,
    pub depth: usize,
}

pub struct Walk<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack.extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}
