//! Streams a resolved archive entry to disk and finalizes its permissions

use crate::installation::binary::archive::{ArchiveEntry, DistributionArchive};
use crate::installation::errors::{InstallationError, InstallationResult};
use crate::installation::traits::PermissionManager;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Default read/write buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Extracts a single archive entry to a destination path.
///
/// Bytes are staged in a temporary file next to the destination and only
/// renamed into place once the whole entry has been written and its
/// permissions are set. A failed extraction therefore never leaves a
/// truncated file at the destination.
#[derive(Debug, Clone)]
pub struct BinaryExtractor {
    buffer_size: usize,
    permissions: Arc<dyn PermissionManager>,
}

impl BinaryExtractor {
    pub fn new(permissions: Arc<dyn PermissionManager>) -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            permissions,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Write `entry` to `destination`, replacing any existing file
    pub fn extract(
        &self,
        archive: &mut DistributionArchive,
        entry: &ArchiveEntry,
        destination: &Path,
    ) -> InstallationResult<()> {
        let parent = destination.parent().ok_or_else(|| {
            InstallationError::stream("create", destination, "destination has no parent directory")
        })?;

        let mut staged = NamedTempFile::new_in(parent)
            .map_err(|e| InstallationError::stream("create", destination, e))?;

        let written = archive.with_entry_reader(entry, |reader| {
            copy_bounded(reader, staged.as_file_mut(), self.buffer_size, destination)
        })?;

        if written != entry.size {
            return Err(InstallationError::stream(
                "read",
                destination,
                format!("entry {} yielded {} of {} bytes", entry.name, written, entry.size),
            ));
        }

        staged
            .as_file_mut()
            .sync_all()
            .map_err(|e| InstallationError::stream("flush", destination, e))?;

        self.finalize_permissions(staged.path())?;

        staged
            .persist(destination)
            .map_err(|e| InstallationError::stream("persist", destination, e.error))?;

        log::debug!(
            "Extracted {} ({} bytes) to {}",
            entry.name,
            written,
            destination.display()
        );
        Ok(())
    }

    fn finalize_permissions(&self, path: &Path) -> InstallationResult<()> {
        if let Err(e) = self.permissions.restrict_writable(path) {
            log::warn!("{}", e);
        }
        if let Err(e) = self.permissions.ensure_readable(path) {
            log::warn!("{}", e);
        }
        self.permissions.ensure_executable(path)
    }
}

fn copy_bounded(
    reader: &mut dyn Read,
    writer: &mut impl Write,
    buffer_size: usize,
    destination: &Path,
) -> InstallationResult<u64> {
    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        let len = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(InstallationError::stream("read", destination, e)),
        };
        writer
            .write_all(&buffer[..len])
            .map_err(|e| InstallationError::stream("write", destination, e))?;
        total += len as u64;
    }

    writer
        .flush()
        .map_err(|e| InstallationError::stream("flush", destination, e))?;
    Ok(total)
}
