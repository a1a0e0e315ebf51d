//! Hierarchical file trees for an editor sidebar.
//!
//! A [`tree::Tree`] holds the nodes of one view. The [`engine`] keeps it in
//! sync with the filesystem, search results or open buffers, the
//! [`repository`] module spreads version-control ownership over it, and
//! [`views`] bundle both into ready-made sidebars.

pub mod config;
pub mod engine;
pub mod ext;
pub mod filesystem;
pub mod repository;
pub mod scheduler;
pub mod tree;
pub mod views;
