use std::path::{Path, PathBuf};
use std::rc::Rc;

use derive_more::Display;

use crate::repository::{Repository, StatusCode};

/// Stable handle to a node inside a [`Tree`](super::Tree).
///
/// The generation makes ids of freed nodes unequal to ids handed out later
/// for the same arena slot, so holding an id across a rescan and comparing
/// it is how callers check that a node survived.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("#{index}.{generation}")]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// The filesystem type of an entry, as reported without following the final symlink.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
    #[display("symlink")]
    Symlink,
    #[display("fifo")]
    Fifo,
    #[display("socket")]
    Socket,
    #[display("char-device")]
    CharDevice,
    #[display("block-device")]
    BlockDevice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub target: PathBuf,
    /// The link points at nothing.
    pub orphan: bool,
    pub target_is_dir: bool,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardStatus {
    #[display("copy")]
    Copy,
    #[display("cut")]
    Cut,
}

/// Which view produced a node, plus whatever extra data that view tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeVariant {
    Filesystem,
    Buffer { bufnr: Option<u32> },
    SearchResult,
    GitChange,
    /// Virtual container that groups nodes without a directory on disk.
    Group { label: String },
    /// Placeholder line, e.g. a message in place of results.
    Text { text: String },
}

impl NodeVariant {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, NodeVariant::Group { .. } | NodeVariant::Text { .. })
    }
}

/// Everything needed to create a node apart from its position in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSeed {
    pub kind: EntryKind,
    pub variant: NodeVariant,
    pub link: Option<LinkInfo>,
    pub size: Option<u64>,
    pub modified: bool,
}

impl NodeSeed {
    pub fn new(kind: EntryKind, variant: NodeVariant) -> Self {
        Self {
            kind,
            variant,
            link: None,
            size: None,
            modified: false,
        }
    }

    pub fn directory(variant: NodeVariant) -> Self {
        Self::new(EntryKind::Directory, variant)
    }

    pub fn file(variant: NodeVariant) -> Self {
        Self::new(EntryKind::File, variant)
    }

    pub fn with_modified(mut self, modified: bool) -> Self {
        self.modified = modified;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) kind: EntryKind,
    pub(crate) variant: NodeVariant,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Option<Vec<NodeId>>,
    pub(crate) scanned: bool,
    pub(crate) expanded: bool,
    pub(crate) extension: Option<String>,
    pub(crate) link: Option<LinkInfo>,
    pub(crate) size: Option<u64>,
    pub(crate) modified: bool,
    pub(crate) clipboard: Option<ClipboardStatus>,
    pub(crate) repo: Option<Rc<Repository>>,
    pub(crate) git_status: Option<StatusCode>,
    pub(crate) ignored: bool,
    pub(crate) watcher_registered: bool,
}

impl Node {
    pub(crate) fn from_seed(path: PathBuf, seed: NodeSeed) -> Self {
        let name = match &seed.variant {
            NodeVariant::Group { label } => label.clone(),
            NodeVariant::Text { text } => text.clone(),
            _ => file_name_of(&path),
        };
        let extension = match seed.kind {
            EntryKind::Directory => None,
            _ => extension_of(&name),
        };

        Self {
            path,
            name,
            kind: seed.kind,
            variant: seed.variant,
            parent: None,
            children: None,
            scanned: false,
            expanded: false,
            extension,
            link: seed.link,
            size: seed.size,
            modified: seed.modified,
            clipboard: None,
            repo: None,
            git_status: None,
            ignored: false,
            watcher_registered: false,
        }
    }

    /// Overwrites the scalar fields that a fresh listing can change. Identity,
    /// position and UI state stay as they are.
    pub(crate) fn merge_seed(&mut self, seed: NodeSeed) {
        self.kind = seed.kind;
        self.link = seed.link;
        self.size = seed.size;
        if !self.variant.is_synthetic() {
            self.variant = seed.variant;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn variant(&self) -> &NodeVariant {
        &self.variant
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Loaded children, `None` while the directory has never been populated.
    pub fn children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    pub fn is_container(&self) -> bool {
        self.kind == EntryKind::Directory || matches!(self.variant, NodeVariant::Group { .. })
    }

    pub fn is_editable(&self) -> bool {
        !self.variant.is_synthetic()
    }

    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_empty(&self) -> bool {
        self.children.as_ref().is_some_and(|c| c.is_empty())
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn link(&self) -> Option<&LinkInfo> {
        self.link.as_ref()
    }

    pub fn link_target(&self) -> Option<&Path> {
        self.link.as_ref().map(|l| l.target.as_path())
    }

    pub fn is_link_orphan(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.orphan)
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn clipboard(&self) -> Option<ClipboardStatus> {
        self.clipboard
    }

    pub fn repo(&self) -> Option<&Rc<Repository>> {
        self.repo.as_ref()
    }

    pub fn git_status(&self) -> Option<StatusCode> {
        self.git_status
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn is_watched(&self) -> bool {
        self.watcher_registered
    }

    /// True when `path` lies strictly below this directory.
    pub fn is_ancestor_of(&self, path: &Path) -> bool {
        self.is_container() && is_path_ancestor(&self.path, path)
    }
}

/// Lexical, separator-aware prefix test; `/a` is not an ancestor of `/ab`.
///
/// Works on whole components, so a filesystem root such as `/` needs no
/// trailing separator to match its children.
pub fn is_path_ancestor(ancestor: &Path, path: &Path) -> bool {
    path != ancestor && path.starts_with(ancestor)
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn extension_of(name: &str) -> Option<String> {
    let trimmed = name.strip_prefix('.').unwrap_or(name);
    trimmed
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
}
