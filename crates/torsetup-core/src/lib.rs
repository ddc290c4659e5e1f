//! Installer for a tor binary bundled inside an application archive.
//!
//! The binary ships inside the distribution archive under a per-architecture
//! library directory. At runtime the installer either reuses a copy the
//! platform already unpacked, reuses a verified private copy, or extracts a
//! fresh one and makes it executable.
//!
//! - **Archive lookup**: fixed candidate paths, native-library layout before legacy JNI
//! - **Extraction**: bounded-buffer streaming into a staged file, renamed into place
//! - **Permissions**: every change is confirmed by reading the mode back
//! - **Reuse**: OS-managed copies are never modified beyond their executable bit
//! - **Configuration**: YAML config with environment overrides, plus a plain-text overlay

pub mod config;
pub mod errors;
pub mod installation;

pub use config::{ConfigLoader, InstallerConfig};
pub use errors::SetupError;
pub use installation::{
    ArchitectureId, BinaryOrigin, InstallContext, InstallOutcome, InstallationError,
    InstalledBinary, TorResourceInstaller,
};

#[cfg(test)]
pub mod test_utils;
