use clap::ValueEnum;
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum ViewKind {
    /// Directory tree read from disk
    #[default]
    #[display("filesystem")]
    Filesystem,
    /// Search matches read from stdin, one path per line
    #[display("search")]
    Search,
    /// Open buffers read from stdin; a leading `+` marks a modified buffer
    #[display("buffers")]
    Buffers,
    /// Changed paths from the file given with `--git-status`
    #[display("git-status")]
    GitStatus,
}
