//! Error types for the installation system

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during an install attempt or a config overlay write
#[derive(Error, Debug)]
pub enum InstallationError {
    #[error("Unable to prepare install directory at {}: {reason}", path.display())]
    DirectoryPreparationFailed { path: PathBuf, reason: String },

    #[error("No binary entry for architecture '{architecture}' in archive {}", archive.display())]
    EntryNotFound { architecture: String, archive: PathBuf },

    #[error("Archive {} could not be read: {message}", path.display())]
    ArchiveUnreadable { path: PathBuf, message: String },

    #[error("Stream I/O failed during {stage} for {}: {message}", path.display())]
    StreamIoFailed {
        stage: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Could not verify {attribute} permission on {}", path.display())]
    PermissionNotVerified {
        path: PathBuf,
        attribute: &'static str,
    },

    #[error("Failed to write config overlay at {}: {reason}", path.display())]
    ConfigWriteFailed { path: PathBuf, reason: String },

    #[error("Extraction did not finish within {timeout:?}")]
    ExtractionTimeout { timeout: Duration },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl InstallationError {
    /// Stable, kebab-case tag for this failure
    pub fn kind(&self) -> &'static str {
        match self {
            InstallationError::DirectoryPreparationFailed { .. } => "directory-preparation-failed",
            InstallationError::EntryNotFound { .. } => "entry-not-found",
            InstallationError::ArchiveUnreadable { .. } => "archive-unreadable",
            InstallationError::StreamIoFailed { .. } => "stream-io-failed",
            InstallationError::PermissionNotVerified { .. } => "permission-not-verified",
            InstallationError::ConfigWriteFailed { .. } => "config-write-failed",
            InstallationError::ExtractionTimeout { .. } => "extraction-timeout",
            InstallationError::InvalidConfiguration { .. } => "invalid-configuration",
        }
    }

    /// True for failures raised while pulling the binary out of the archive
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            InstallationError::EntryNotFound { .. }
                | InstallationError::ArchiveUnreadable { .. }
                | InstallationError::StreamIoFailed { .. }
                | InstallationError::ExtractionTimeout { .. }
        )
    }

    pub(crate) fn stream(stage: &'static str, path: impl Into<PathBuf>, err: impl ToString) -> Self {
        InstallationError::StreamIoFailed {
            stage,
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Result type for installation operations
pub type InstallationResult<T> = Result<T, InstallationError>;
