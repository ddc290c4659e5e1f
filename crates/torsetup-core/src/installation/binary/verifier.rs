//! Decides whether an already-installed binary can be reused

use crate::installation::binary::archive::{ArchiveEntry, DistributionArchive};
use crate::installation::errors::{InstallationError, InstallationResult};
use crate::installation::traits::{BinaryNames, InstalledBinary};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

/// Read-only checks over candidate binary locations
#[derive(Debug, Clone)]
pub struct InstallationVerifier {
    names: BinaryNames,
}

impl InstallationVerifier {
    pub fn new(names: BinaryNames) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &BinaryNames {
        &self.names
    }

    /// Look for a binary in the OS-managed native-library directory.
    ///
    /// Checks the primary name first, then the legacy-prefixed one. Nothing in
    /// `native_library_dir` is ever modified here.
    pub fn find_reusable(&self, native_library_dir: &Path) -> Option<InstalledBinary> {
        if !native_library_dir.is_dir() {
            log::debug!(
                "Native library directory {} does not exist",
                native_library_dir.display()
            );
            return None;
        }

        self.names
            .candidates()
            .into_iter()
            .map(|name| InstalledBinary::inspect(&native_library_dir.join(name)))
            .find(|candidate| candidate.exists)
    }

    /// True when `path` is executable and byte-identical to `entry`.
    ///
    /// A file left over from an earlier attempt is never trusted on existence
    /// alone.
    pub fn matches_entry(
        &self,
        path: &Path,
        archive: &mut DistributionArchive,
        entry: &ArchiveEntry,
    ) -> InstallationResult<bool> {
        let installed = InstalledBinary::inspect(path);
        if !installed.is_usable() {
            return Ok(false);
        }

        let on_disk_len = std::fs::metadata(path)
            .map_err(|e| InstallationError::stream("verify", path, e))?
            .len();
        if on_disk_len != entry.size {
            log::debug!(
                "Size mismatch for {}: {} on disk, {} in archive",
                path.display(),
                on_disk_len,
                entry.size
            );
            return Ok(false);
        }

        let file = File::open(path).map_err(|e| InstallationError::stream("verify", path, e))?;
        let mut on_disk = BufReader::new(file);
        archive.with_entry_reader(entry, |reader| same_content(reader, &mut on_disk, path))
    }
}

fn same_content(
    expected: &mut dyn Read,
    actual: &mut impl Read,
    path: &Path,
) -> InstallationResult<bool> {
    let mut left = [0u8; 4096];
    let mut right = [0u8; 4096];

    loop {
        let len = read_full(&mut *expected, &mut left)
            .map_err(|e| InstallationError::stream("verify", path, e))?;
        let other = read_full(&mut *actual, &mut right[..len.max(1)])
            .map_err(|e| InstallationError::stream("verify", path, e))?;

        if len == 0 {
            return Ok(other == 0);
        }
        if other != len || left[..len] != right[..len] {
            return Ok(false);
        }
    }
}

fn read_full(reader: &mut (impl Read + ?Sized), buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
