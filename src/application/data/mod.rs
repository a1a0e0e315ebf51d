mod log_level;
mod view_kind;

pub use log_level::LogLevel;
pub use view_kind::ViewKind;
