//! Configuration module for the installer
//!
//! Supports YAML configuration files with environment variable overrides and
//! programmatic construction via `InstallerConfig::new`.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;


use crate::errors::SetupError;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<InstallerConfig, SetupError> {
    ConfigLoader::from_file(path)
}

/// Validate a configuration
pub fn validate_config(config: &InstallerConfig) -> Result<(), SetupError> {
    config.validate()
}
