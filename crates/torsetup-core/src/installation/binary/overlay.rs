//! Plain-text config overlay written next to the installed binary

use crate::installation::errors::{InstallationError, InstallationResult};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace the file at `path` with exactly `content`.
///
/// The new text is written in full to a fresh file in the same directory and
/// then renamed over the old one, so a failed write leaves the previous
/// overlay untouched.
pub fn write_config_overlay(path: &Path, content: &str) -> InstallationResult<()> {
    let failed = |reason: String| InstallationError::ConfigWriteFailed {
        path: path.to_path_buf(),
        reason,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => return Err(failed("path has no parent directory".to_string())),
    };
    if path.is_dir() {
        return Err(failed("path is a directory".to_string()));
    }

    let mut staged = NamedTempFile::new_in(parent).map_err(|e| failed(e.to_string()))?;
    staged
        .write_all(content.as_bytes())
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| failed(e.to_string()))?;

    if path.exists() {
        log::debug!("Replacing existing config overlay at {}", path.display());
    }

    staged.persist(path).map_err(|e| failed(e.error.to_string()))?;
    log::info!(
        "Wrote config overlay to {} ({} bytes)",
        path.display(),
        content.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_overlay_replaces_longer_content_without_residue() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("torrc.custom");
        fs::write(&path, "SocksPort 9050\nControlPort 9051\nLog notice stdout\n").unwrap();

        write_config_overlay(&path, "text").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "text");
    }

    #[test]
    fn test_overlay_creates_missing_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("torrc.custom");

        write_config_overlay(&path, "UseBridges 1\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "UseBridges 1\n");
    }

    #[test]
    fn test_overlay_empty_content() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("torrc.custom");
        fs::write(&path, "old").unwrap();

        write_config_overlay(&path, "").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_overlay_missing_directory_keeps_nothing() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("absent").join("torrc.custom");

        let err = write_config_overlay(&path, "text").unwrap_err();
        assert_eq!(err.kind(), "config-write-failed");
        assert!(!path.exists());
    }

    #[test]
    fn test_overlay_onto_directory_fails_and_keeps_it() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("torrc.custom");
        fs::create_dir(&path).unwrap();

        let err = write_config_overlay(&path, "text").unwrap_err();
        assert!(matches!(err, InstallationError::ConfigWriteFailed { .. }));
        assert!(path.is_dir());
    }
}
