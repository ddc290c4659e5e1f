//! Bundled binary installation
//!
//! The pieces compose in this order:
//! - `verifier` looks for a reusable binary in the OS-managed directory
//! - `archive` opens the distribution archive and resolves the entry
//! - `extractor` streams the entry to the private install directory
//! - `permissions` sets and re-reads the executable bits
//! - `installer` drives the whole attempt under a per-destination `lock`

pub mod archive;
pub mod extractor;
pub mod installer;
pub mod lock;
pub mod overlay;
pub mod permissions;
pub mod verifier;

// Re-exports
pub use archive::{ArchiveEntry, DistributionArchive};
pub use extractor::BinaryExtractor;
pub use installer::{InstallContext, InstallReport, TorResourceInstaller};
pub use lock::DestinationLock;
pub use overlay::write_config_overlay;
pub use permissions::default_permission_manager;
pub use verifier::InstallationVerifier;
