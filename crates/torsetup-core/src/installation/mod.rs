//! Installation system for the bundled tor binary
//!
//! This module locates the platform binary inside the distribution archive,
//! extracts it to a private directory when no usable copy exists, and keeps
//! its permissions executable.

pub mod binary;
pub mod errors;
pub mod traits;


// Re-exports for convenience
pub use binary::*;
pub use errors::*;
pub use traits::*;

use crate::config::types::InstallerConfig;

/// Creates an installer for `config` using the platform permission manager
pub fn create_default_installer(config: &InstallerConfig) -> InstallationResult<TorResourceInstaller> {
    TorResourceInstaller::from_config(config)
}
