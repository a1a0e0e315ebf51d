use std::path::PathBuf;

use sidetree::config::ExplorerConfig;
use sidetree::ext::normalize_path;

use crate::application::data::ViewKind;
use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub root: PathBuf,
    pub view: ViewKind,
    pub depth: usize,
    pub follow: bool,
    pub git_status: Option<PathBuf>,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            root: absolute(cli.root),
            view: cli.view,
            depth: cli.depth,
            follow: cli.follow,
            git_status: cli.git_status.map(absolute),
        }
    }
}

impl RuntimeConfig {
    /// The filesystem view keeps watching when asked on the command line or
    /// in the config file.
    pub fn follows(&self, config: &ExplorerConfig) -> bool {
        self.view == ViewKind::Filesystem && (self.follow || config.watch)
    }
}

// Node paths are compared lexically, so the root has to be absolute.
fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return normalize_path(&path);
    }
    match std::env::current_dir() {
        Ok(current_dir) => normalize_path(&current_dir.join(path)),
        Err(_) => normalize_path(&path),
    }
}
