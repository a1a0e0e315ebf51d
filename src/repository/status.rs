use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use derive_more::Display;
use tracing::{debug, warn};

use super::Repository;
use crate::ext::normalize_path;
use crate::tree::{EntryKind, NodeId, Tree, is_path_ancestor};

/// Per-path change reported by the version-control tool, most significant last.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusCode {
    #[display("?")]
    Untracked,
    #[display("R")]
    Renamed,
    #[display("A")]
    Added,
    #[display("M")]
    Modified,
    #[display("D")]
    Deleted,
    #[display("U")]
    Conflict,
}

/// Source of version-control decorations. Invoking the tool and parsing its
/// output is the implementor's business.
pub trait StatusProvider {
    fn status_of(&self, repo: &Repository, path: &Path, kind: EntryKind) -> Option<StatusCode>;
    fn is_ignored(&self, repo: &Repository, path: &Path, kind: EntryKind) -> bool;
}

/// Status of one repository captured at a point in time.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    toplevel: PathBuf,
    entries: BTreeMap<PathBuf, StatusCode>,
    ignored: Vec<PathBuf>,
}

impl StatusSnapshot {
    pub fn new(toplevel: impl AsRef<Path>) -> Self {
        Self {
            toplevel: normalize_path(toplevel.as_ref()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, path: impl AsRef<Path>, code: StatusCode) -> Self {
        self.insert(path, code);
        self
    }

    pub fn with_ignored(mut self, path: impl AsRef<Path>) -> Self {
        self.ignored.push(normalize_path(path.as_ref()));
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, code: StatusCode) {
        self.entries.insert(normalize_path(path.as_ref()), code);
    }

    pub fn toplevel(&self) -> &Path {
        &self.toplevel
    }

    /// Every path carrying a status, in path order.
    pub fn changed_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Reads `git status --porcelain --ignored` output. Paths in it are
    /// relative to `toplevel`. Lines that do not parse are logged and skipped.
    pub fn from_porcelain(toplevel: impl AsRef<Path>, output: &str) -> Self {
        let mut snapshot = Self::new(toplevel);
        for line in output.lines().filter(|line| !line.trim().is_empty()) {
            let Some((xy, rest)) = line.split_at_checked(2) else {
                warn!("Skipping malformed status line '{}'", line);
                continue;
            };
            let Some(path) = rest.strip_prefix(' ') else {
                warn!("Skipping malformed status line '{}'", line);
                continue;
            };
            // Renames list the old path first.
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            let path = snapshot.toplevel.join(unquote(path));

            if xy == "!!" {
                snapshot.ignored.push(normalize_path(&path));
                continue;
            }
            match parse_xy(xy) {
                Some(code) => snapshot.insert(path, code),
                None => warn!("Unknown status '{}' for {}", xy, path.display()),
            }
        }
        debug!(
            "Read {} changed and {} ignored paths",
            snapshot.entries.len(),
            snapshot.ignored.len()
        );
        snapshot
    }

    fn covers(&self, repo: &Repository) -> bool {
        repo.toplevel() == self.toplevel
    }

    // Most significant status among the descendants of `dir`.
    fn aggregate(&self, dir: &Path) -> Option<StatusCode> {
        self.entries
            .range::<Path, _>((std::ops::Bound::Excluded(dir), std::ops::Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(dir))
            .map(|(_, code)| *code)
            .max()
    }
}

fn parse_xy(xy: &str) -> Option<StatusCode> {
    if xy == "??" {
        return Some(StatusCode::Untracked);
    }
    if matches!(xy, "AA" | "DD") || xy.contains('U') {
        return Some(StatusCode::Conflict);
    }
    xy.chars()
        .filter_map(|letter| match letter {
            'M' | 'T' => Some(StatusCode::Modified),
            'A' => Some(StatusCode::Added),
            'D' => Some(StatusCode::Deleted),
            'R' | 'C' => Some(StatusCode::Renamed),
            _ => None,
        })
        .max()
}

fn unquote(path: &str) -> &str {
    path.strip_prefix('"')
        .and_then(|path| path.strip_suffix('"'))
        .unwrap_or(path)
}

impl StatusProvider for StatusSnapshot {
    fn status_of(&self, repo: &Repository, path: &Path, kind: EntryKind) -> Option<StatusCode> {
        if !self.covers(repo) {
            return None;
        }
        if let Some(code) = self.entries.get(path) {
            return Some(*code);
        }
        match kind {
            EntryKind::Directory => self.aggregate(path),
            _ => None,
        }
    }

    fn is_ignored(&self, repo: &Repository, path: &Path, _kind: EntryKind) -> bool {
        self.covers(repo)
            && self
                .ignored
                .iter()
                .any(|ignored| ignored == path || is_path_ancestor(ignored, path))
    }
}

/// Writes status and ignored decorations on `start` and its loaded
/// descendants. Nodes without a repository get theirs cleared.
pub fn apply_status<P>(tree: &mut Tree, start: NodeId, provider: &P) -> usize
where
    P: StatusProvider + ?Sized,
{
    let decorations: Vec<(NodeId, Option<StatusCode>, bool)> = tree
        .walk(start)
        .filter_map(|id| tree.get(id).map(|node| (id, node)))
        .map(|(id, node)| match node.repo() {
            Some(repo) => (
                id,
                provider.status_of(repo, node.path(), node.kind()),
                provider.is_ignored(repo, node.path(), node.kind()),
            ),
            None => (id, None, false),
        })
        .collect();

    let mut decorated = 0;
    for (id, status, ignored) in decorations {
        if let Some(node) = tree.get_mut(id) {
            if status.is_some() || ignored {
                decorated += 1;
            }
            node.git_status = status;
            node.ignored = ignored;
        }
    }
    debug!("Applied version-control status to {} nodes", decorated);
    decorated
}
