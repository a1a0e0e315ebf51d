use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::ext::normalize_path;
use crate::tree::is_path_ancestor;

/// Opaque handle to one version-control working tree.
///
/// Nodes share the handle through `Rc`; two nodes belong to the same
/// repository when their handles are the same allocation.
#[derive(Debug, PartialEq, Eq)]
pub struct Repository {
    toplevel: PathBuf,
}

impl Repository {
    pub fn new(toplevel: impl AsRef<Path>) -> Self {
        Self {
            toplevel: normalize_path(toplevel.as_ref()),
        }
    }

    pub fn toplevel(&self) -> &Path {
        &self.toplevel
    }

    /// True for the toplevel itself and everything below it.
    pub fn contains(&self, path: &Path) -> bool {
        path == self.toplevel || is_path_ancestor(&self.toplevel, path)
    }
}

/// Repository handles keyed by toplevel, owned by whoever owns the trees.
#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    repositories: HashMap<PathBuf, Rc<Repository>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `toplevel`, creating it on first use.
    pub fn register(&mut self, toplevel: impl AsRef<Path>) -> Rc<Repository> {
        let toplevel = normalize_path(toplevel.as_ref());
        self.repositories
            .entry(toplevel.clone())
            .or_insert_with(|| {
                debug!("Registering repository at {}", toplevel.display());
                Rc::new(Repository::new(&toplevel))
            })
            .clone()
    }

    pub fn get(&self, toplevel: impl AsRef<Path>) -> Option<Rc<Repository>> {
        self.repositories.get(toplevel.as_ref()).cloned()
    }

    pub fn unregister(&mut self, toplevel: impl AsRef<Path>) -> Option<Rc<Repository>> {
        self.repositories.remove(toplevel.as_ref())
    }

    /// The innermost registered repository containing `path`.
    pub fn find_for(&self, path: impl AsRef<Path>) -> Option<Rc<Repository>> {
        let path = path.as_ref();
        self.repositories
            .values()
            .filter(|repo| repo.contains(path))
            .max_by_key(|repo| repo.toplevel().components().count())
            .cloned()
    }

    /// Handles ordered from the outermost toplevel inwards.
    pub fn iter_outermost_first(&self) -> Vec<Rc<Repository>> {
        let mut repositories: Vec<_> = self.repositories.values().cloned().collect();
        repositories.sort_by_key(|repo| repo.toplevel().components().count());
        repositories
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
