//! Independent trees shown side by side, each fed by a different source.

mod buffers_view;
mod filesystem_view;
mod git_status_view;
mod search_view;

pub use buffers_view::{BuffersView, common_ancestor};
pub use filesystem_view::FilesystemView;
pub use git_status_view::GitStatusView;
pub use search_view::{SearchOutcome, SearchView};
