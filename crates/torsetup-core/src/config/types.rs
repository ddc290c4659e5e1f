//! Configuration type definitions for the installer
//!
//! A minimal config only names the distribution archive; every other field has
//! a default suited to a single-user install.

use crate::errors::SetupError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound for the extraction buffer
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallerConfig {
    pub archive_path: PathBuf,
    #[serde(default)]
    pub native_library_dir: Option<PathBuf>,
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default = "default_binary_name")]
    pub binary_name: String,
    #[serde(default = "default_overlay_name")]
    pub config_overlay_name: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub fallback_on_native_permission_failure: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl InstallerConfig {
    /// Config with defaults for everything but the archive
    pub fn new(archive_path: PathBuf) -> Self {
        Self {
            archive_path,
            native_library_dir: None,
            install_dir: default_install_dir(),
            architecture: None,
            binary_name: default_binary_name(),
            config_overlay_name: default_overlay_name(),
            buffer_size: default_buffer_size(),
            timeout_secs: None,
            fallback_on_native_permission_failure: true,
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.archive_path.as_os_str().is_empty() {
            return Err(SetupError::ValidationError(
                "archive_path must be set".to_string(),
            ));
        }
        if self.install_dir.as_os_str().is_empty() {
            return Err(SetupError::ValidationError(
                "install_dir must be set".to_string(),
            ));
        }

        if let Some(arch) = &self.architecture {
            if arch.trim().is_empty() {
                return Err(SetupError::ValidationError(
                    "architecture must not be empty".to_string(),
                ));
            }
            if arch.contains('/') || arch.contains('\\') || arch.contains("..") {
                return Err(SetupError::ValidationError(format!(
                    "architecture '{}' must be a single path segment",
                    arch
                )));
            }
        }

        for (field, value) in [
            ("binary_name", &self.binary_name),
            ("config_overlay_name", &self.config_overlay_name),
        ] {
            if value.is_empty() || value.contains('/') || value.contains('\\') || value == ".." {
                return Err(SetupError::ValidationError(format!(
                    "{} '{}' must be a plain file name",
                    field, value
                )));
            }
        }

        if self.buffer_size == 0 || self.buffer_size > MAX_BUFFER_SIZE {
            return Err(SetupError::ValidationError(format!(
                "buffer_size must be between 1 and {} bytes, got {}",
                MAX_BUFFER_SIZE, self.buffer_size
            )));
        }

        if self.timeout_secs == Some(0) {
            return Err(SetupError::ValidationError(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_install_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir)
        .join("torsetup")
        .join("torfiles")
}

fn default_binary_name() -> String {
    "tor.so".to_string()
}

fn default_overlay_name() -> String {
    "torrc.custom".to_string()
}

fn default_buffer_size() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
