//! Configuration and dependency wiring for the content indexer.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{LogFormat, Settings};
