//! Error types shared across the installer crate
//!
//! `SetupError` is the coarse, cloneable error surfaced to callers that do not
//! care about the detailed install taxonomy. Installation failures keep their
//! tagged `InstallationError` form until they cross this boundary.

use crate::installation::errors::InstallationError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Installer error [{kind}]: {message}")]
    InstallerError { kind: &'static str, message: String },
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl SetupError {
    /// Stable tag of the underlying failure, if it came from the installer
    pub fn installer_kind(&self) -> Option<&'static str> {
        match self {
            SetupError::InstallerError { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SetupError {
    fn from(err: std::io::Error) -> Self {
        SetupError::IoError(err.to_string())
    }
}

impl From<InstallationError> for SetupError {
    fn from(err: InstallationError) -> Self {
        match err {
            InstallationError::InvalidConfiguration { message } => {
                SetupError::ValidationError(message)
            }
            other => SetupError::InstallerError {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }
}
