//! Configuration loader for YAML files and environment overrides

use crate::config::types::InstallerConfig;
use crate::errors::SetupError;
use std::env;
use std::path::{Path, PathBuf};

pub const ENV_ARCHIVE: &str = "TORSETUP_ARCHIVE";
pub const ENV_ARCH: &str = "TORSETUP_ARCH";
pub const ENV_NATIVE_LIB_DIR: &str = "TORSETUP_NATIVE_LIB_DIR";
pub const ENV_INSTALL_DIR: &str = "TORSETUP_INSTALL_DIR";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<InstallerConfig, SetupError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SetupError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::parse(&content)?;

        // Relative paths in the file are relative to the file itself
        if let Some(base_dir) = path.parent() {
            Self::resolve_relative(&mut config, base_dir);
        }

        Self::finish(config)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<InstallerConfig, SetupError> {
        Self::finish(Self::parse(content)?)
    }

    /// Build a configuration from an archive path plus environment overrides
    pub fn from_env(archive_path: Option<PathBuf>) -> Result<InstallerConfig, SetupError> {
        let config = InstallerConfig::new(archive_path.unwrap_or_default());
        Self::finish(config)
    }

    fn parse(content: &str) -> Result<InstallerConfig, SetupError> {
        serde_yaml::from_str(content)
            .map_err(|e| SetupError::ConfigError(format!("Failed to parse YAML config: {}", e)))
    }

    fn finish(mut config: InstallerConfig) -> Result<InstallerConfig, SetupError> {
        Self::apply_environment(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over file values
    fn apply_environment(config: &mut InstallerConfig) {
        if let Some(archive) = non_empty_var(ENV_ARCHIVE) {
            log::debug!("Archive path overridden by {}", ENV_ARCHIVE);
            config.archive_path = PathBuf::from(archive);
        }
        if let Some(arch) = non_empty_var(ENV_ARCH) {
            log::debug!("Architecture overridden by {}: {}", ENV_ARCH, arch);
            config.architecture = Some(arch);
        }
        if let Some(dir) = non_empty_var(ENV_NATIVE_LIB_DIR) {
            config.native_library_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty_var(ENV_INSTALL_DIR) {
            config.install_dir = PathBuf::from(dir);
        }
    }

    fn resolve_relative(config: &mut InstallerConfig, base_dir: &Path) {
        let absolutize = |path: &mut PathBuf| {
            if path.is_relative() && !path.as_os_str().is_empty() {
                *path = base_dir.join(&*path);
            }
        };

        absolutize(&mut config.archive_path);
        absolutize(&mut config.install_dir);
        if let Some(dir) = config.native_library_dir.as_mut() {
            absolutize(dir);
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
