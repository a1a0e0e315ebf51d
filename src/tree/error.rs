use std::path::PathBuf;

use snafu::Snafu;

use crate::tree::NodeId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TreeError {
    #[snafu(display("Path {} does not exist", path.display()))]
    NotFound { path: PathBuf },
    #[snafu(display(
        "Cannot place {} under {}, which is not a container",
        path.display(),
        parent.display()
    ))]
    StructuralViolation { path: PathBuf, parent: PathBuf },
    #[snafu(display("Failed to list directory {}", path.display()))]
    ListingFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Path {} is outside of tree root {}", path.display(), root.display()))]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[snafu(display("Path {} is already present in the tree", path.display()))]
    DuplicatePath { path: PathBuf },
    #[snafu(display("Node {} is no longer part of the tree", id))]
    StaleNode { id: NodeId },
}
