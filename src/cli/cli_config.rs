use std::path::PathBuf;

use clap::Parser;

use crate::application::data::{LogLevel, ViewKind};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Print an explorer tree of a directory")]
pub struct Cli {
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// The directory shown at the top of the tree
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,

    #[clap(long, default_value = "filesystem", value_enum)]
    pub view: ViewKind,

    /// How many directory levels to expand below the root
    #[clap(long, short, default_value_t = 1)]
    pub depth: usize,

    /// Keep watching the root and print the tree again after every change
    #[clap(long, short)]
    pub follow: bool,

    /// Output of `git status --porcelain --ignored`, with the root as repository toplevel
    #[clap(long)]
    pub git_status: Option<PathBuf>,
}
