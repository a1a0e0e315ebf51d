//! Version-control repository handles and how they spread over a tree.

mod propagate;
#[allow(clippy::module_inception)]
mod repository;
mod status;

pub use propagate::{attach, attach_registered};
pub use repository::{Repository, RepositoryRegistry};
pub use status::{StatusCode, StatusProvider, StatusSnapshot, apply_status};
