mod application_impl;
pub mod data;
mod outline;
mod runtime_config;

pub use application_impl::{Application, ApplicationError};
pub use outline::OutlineRenderer;
pub use runtime_config::RuntimeConfig;
