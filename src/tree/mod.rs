//! In-memory explorer tree.
//!
//! Nodes live in an arena owned by [`Tree`]; a directory owns its children
//! through their ids and every node points back at its parent by id. The
//! algorithms that keep the tree in sync with the filesystem live in
//! [`crate::engine`].

mod arena;
mod comparator;
mod error;
mod node;

pub use arena::{OutlineLine, Tree, Walk};
pub use comparator::{ByType, Comparator, DirectoriesFirst, SortOrder};
pub use error::TreeError;
pub(crate) use error::{
    ListingFailedSnafu, NotFoundSnafu, OutsideRootSnafu, StructuralViolationSnafu,
};
pub use node::{
    ClipboardStatus, EntryKind, LinkInfo, Node, NodeId, NodeSeed, NodeVariant, is_path_ancestor,
};
pub(crate) use node::file_name_of;
