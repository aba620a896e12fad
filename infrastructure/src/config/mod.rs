//! Configuration loading

pub mod file_config;
pub mod loader;

pub use file_config::{FileConfig, ModelConfig};
pub use loader::ConfigLoader;
