use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use super::{Repository, RepositoryRegistry};
use crate::tree::{NodeId, Tree, is_path_ancestor};

/// Attaches `repo` to the subtree it owns, starting from `node`.
///
/// The walk starts at the loaded node whose path is the repository
/// toplevel, or at the tree root when the toplevel lies above the loaded
/// tree. Subtrees already owned by a repository nested inside `repo` are
/// left alone. Returns how many nodes now point at `repo`.
pub fn attach(tree: &mut Tree, node: NodeId, repo: &Rc<Repository>) -> usize {
    let Some(start) = attach_point(tree, node, repo.toplevel()) else {
        debug!(
            "Repository {} does not own node {}; nothing to attach",
            repo.toplevel().display(),
            node
        );
        return 0;
    };

    let mut attached = 0;
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        let Some(current) = tree.get(id) else {
            continue;
        };
        if let Some(existing) = current.repo() {
            if !Rc::ptr_eq(existing, repo) && is_path_ancestor(repo.toplevel(), existing.toplevel())
            {
                continue;
            }
        }
        if let Some(current) = tree.get_mut(id) {
            current.repo = Some(repo.clone());
            attached += 1;
        }
        stack.extend(tree.children(id).iter().copied());
    }

    debug!(
        "Attached repository {} to {} nodes",
        repo.toplevel().display(),
        attached
    );
    attached
}

/// Attaches every registered repository relevant to the tree, outermost
/// first so nested repositories end up owning their own subtrees.
pub fn attach_registered(tree: &mut Tree, registry: &RepositoryRegistry) -> usize {
    let root = tree.root();
    let root_path = tree.root_path().to_path_buf();
    registry
        .iter_outermost_first()
        .iter()
        .filter(|repo| repo.contains(&root_path) || is_path_ancestor(&root_path, repo.toplevel()))
        .map(|repo| attach(tree, root, repo))
        .sum()
}

fn attach_point(tree: &Tree, node: NodeId, toplevel: &Path) -> Option<NodeId> {
    let path = tree.path(node)?;

    if path == toplevel {
        return Some(node);
    }
    if is_path_ancestor(toplevel, path) {
        let owner = tree
            .ancestors(node)
            .find(|ancestor| tree.path(*ancestor) == Some(toplevel));
        return Some(owner.unwrap_or_else(|| tree.root()));
    }
    if is_path_ancestor(path, toplevel) {
        return tree.find(toplevel);
    }
    None
}
