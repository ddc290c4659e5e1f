//! Read-only access to the distribution archive and binary entry lookup

use crate::installation::errors::{InstallationError, InstallationResult};
use crate::installation::traits::{ArchitectureId, BinaryNames};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Library directory prefixes in lookup order: native-library first, legacy JNI second
pub const CANDIDATE_DIRS: [&str; 2] = ["lib", "jni"];

/// An opened distribution archive.
///
/// Owned by a single install attempt; the underlying file handle is released
/// when the value is dropped.
pub struct DistributionArchive {
    path: PathBuf,
    inner: ZipArchive<BufReader<File>>,
}

/// A binary entry located inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub index: usize,
    pub name: String,
    pub size: u64,
}

impl DistributionArchive {
    pub fn open(path: &Path) -> InstallationResult<Self> {
        let unreadable = |message: String| InstallationError::ArchiveUnreadable {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
        let inner = ZipArchive::new(BufReader::new(file)).map_err(|e| unreadable(e.to_string()))?;
        log::debug!("Opened archive {} ({} entries)", path.display(), inner.len());

        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the binary for `architecture`.
    ///
    /// `Ok(None)` means no candidate path exists; I/O and format failures on
    /// the archive itself are returned as errors.
    pub fn resolve(
        &mut self,
        architecture: &ArchitectureId,
        names: &BinaryNames,
    ) -> InstallationResult<Option<ArchiveEntry>> {
        for candidate in candidate_paths(architecture, names) {
            let Some(index) = self.inner.index_for_name(&candidate) else {
                continue;
            };

            let entry = self.inner.by_index(index).map_err(|e| {
                InstallationError::ArchiveUnreadable {
                    path: self.path.clone(),
                    message: format!("entry {}: {}", candidate, e),
                }
            })?;
            if entry.is_dir() {
                continue;
            }

            log::debug!("Resolved {} for architecture {}", candidate, architecture);
            return Ok(Some(ArchiveEntry {
                index,
                name: candidate,
                size: entry.size(),
            }));
        }

        log::debug!(
            "No candidate entry for architecture {} in {}",
            architecture,
            self.path.display()
        );
        Ok(None)
    }

    /// Stream the decompressed bytes of `entry` into `sink`.
    ///
    /// The entry reader lives only for the duration of this call.
    pub(crate) fn with_entry_reader<T>(
        &mut self,
        entry: &ArchiveEntry,
        sink: impl FnOnce(&mut dyn Read) -> InstallationResult<T>,
    ) -> InstallationResult<T> {
        let mut reader = self.inner.by_index(entry.index).map_err(|e| {
            InstallationError::stream("open-entry", &self.path, format!("{}: {}", entry.name, e))
        })?;
        sink(&mut reader)
    }
}

/// Candidate archive paths for `architecture`, highest priority first
pub fn candidate_paths(architecture: &ArchitectureId, names: &BinaryNames) -> Vec<String> {
    CANDIDATE_DIRS
        .iter()
        .flat_map(|dir| {
            names
                .candidates()
                .into_iter()
                .map(move |name| format!("{}/{}/{}", dir, architecture, name))
        })
        .collect()
}
