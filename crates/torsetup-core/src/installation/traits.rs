//! Core traits and value types for the installation system

use crate::installation::errors::{InstallationError, InstallationResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// Platform permission capability.
///
/// Every `ensure_*` call must re-read the attribute after changing it and
/// only report success when the read-back confirms the change. Failures are
/// returned to the caller, who decides whether they block installation.
pub trait PermissionManager: Send + Sync + fmt::Debug {
    /// Make the file readable by the calling process
    fn ensure_readable(&self, path: &Path) -> InstallationResult<()>;

    /// Make the file executable by the calling process
    fn ensure_executable(&self, path: &Path) -> InstallationResult<()>;

    /// Keep the file owner-writable but drop group and other write access
    fn restrict_writable(&self, path: &Path) -> InstallationResult<()>;

    /// Human-readable name for logging
    fn get_name(&self) -> &'static str;
}

/// Instruction-set tag of the running device, used as an archive lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchitectureId(String);

impl ArchitectureId {
    pub fn new(id: impl Into<String>) -> InstallationResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InstallationError::InvalidConfiguration {
                message: "architecture id must not be empty".to_string(),
            });
        }
        if id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(InstallationError::InvalidConfiguration {
                message: format!("architecture id '{}' must be a single path segment", id),
            });
        }
        Ok(Self(id))
    }

    /// ABI tag for the CPU this process was compiled for
    pub fn current() -> Self {
        let abi = match std::env::consts::ARCH {
            "aarch64" => "arm64-v8a",
            "arm" => "armeabi-v7a",
            "x86" => "x86",
            "x86_64" => "x86_64",
            other => other,
        };
        Self(abi.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchitectureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Primary and legacy-prefixed file names of the bundled binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryNames {
    pub primary: String,
    pub legacy: String,
}

impl BinaryNames {
    pub const LEGACY_PREFIX: &'static str = "lib";

    pub fn new(primary: impl Into<String>) -> InstallationResult<Self> {
        let primary = primary.into();
        if primary.is_empty() || primary.contains('/') || primary.contains('\\') {
            return Err(InstallationError::InvalidConfiguration {
                message: format!("binary name '{}' must be a plain file name", primary),
            });
        }
        let legacy = format!("{}{}", Self::LEGACY_PREFIX, primary);
        Ok(Self { primary, legacy })
    }

    /// Names in lookup order
    pub fn candidates(&self) -> [&str; 2] {
        [&self.primary, &self.legacy]
    }
}

impl Default for BinaryNames {
    fn default() -> Self {
        Self {
            primary: "tor.so".to_string(),
            legacy: "libtor.so".to_string(),
        }
    }
}

/// Snapshot of a binary on disk, taken by direct inspection.
///
/// The access flags describe what the calling process may do with the file,
/// not just the owner's permission bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBinary {
    pub path: PathBuf,
    pub exists: bool,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    /// Group or other write bits set
    pub shared_writable: bool,
}

impl InstalledBinary {
    /// Read the current attributes of `path`; never fails, a missing file is
    /// reported with every flag false
    pub fn inspect(path: &Path) -> Self {
        let missing = Self {
            path: path.to_path_buf(),
            exists: false,
            readable: false,
            writable: false,
            executable: false,
            shared_writable: false,
        };

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return missing,
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let access = FileAccess::for_caller(metadata.mode(), metadata.uid(), metadata.gid());
            Self {
                exists: true,
                readable: access.read,
                writable: access.write,
                executable: access.execute,
                shared_writable: metadata.mode() & 0o022 != 0,
                ..missing
            }
        }

        #[cfg(not(unix))]
        {
            Self {
                exists: true,
                readable: true,
                writable: !metadata.permissions().readonly(),
                executable: true,
                ..missing
            }
        }
    }

    pub fn is_shared_writable(&self) -> bool {
        self.shared_writable
    }

    pub fn is_usable(&self) -> bool {
        self.exists && self.executable
    }
}

/// Where the active binary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOrigin {
    /// OS-managed native-library directory
    NativeLibrary,
    /// Verified copy already present in the private install directory
    PrivateCopy,
    /// Extracted during this attempt
    Fresh,
}

impl fmt::Display for BinaryOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BinaryOrigin::NativeLibrary => "native-library",
            BinaryOrigin::PrivateCopy => "private-copy",
            BinaryOrigin::Fresh => "fresh",
        };
        f.write_str(label)
    }
}

/// Successful result of an install attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub path: PathBuf,
    pub origin: BinaryOrigin,
}

impl InstallOutcome {
    /// True when the binary was found rather than extracted
    pub fn reused(&self) -> bool {
        self.origin != BinaryOrigin::Fresh
    }
}

/// Effective access of one process to a file, derived from its mode bits
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileAccess {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

#[cfg(unix)]
impl FileAccess {
    /// Access for a caller with effective `uid`, whose groups are matched by
    /// `in_group`. The permission triplet is chosen the way the kernel does:
    /// owner, else group, else other. Root may read and write anything and
    /// execute anything with at least one execute bit.
    pub(crate) fn resolve(
        mode: u32,
        owner: u32,
        group: u32,
        uid: u32,
        in_group: impl FnOnce(u32) -> bool,
    ) -> Self {
        if uid == 0 {
            return Self {
                read: true,
                write: true,
                execute: mode & 0o111 != 0,
            };
        }

        let shift = if uid == owner {
            6
        } else if in_group(group) {
            3
        } else {
            0
        };
        let bits = (mode >> shift) & 0o7;
        Self {
            read: bits & 0o4 != 0,
            write: bits & 0o2 != 0,
            execute: bits & 0o1 != 0,
        }
    }

    fn for_caller(mode: u32, owner: u32, group: u32) -> Self {
        // SAFETY: geteuid never fails and has no preconditions.
        let uid = unsafe { libc::geteuid() };
        Self::resolve(mode, owner, group, uid, caller_in_group)
    }
}

#[cfg(unix)]
fn caller_in_group(gid: u32) -> bool {
    // SAFETY: getegid never fails and has no preconditions.
    if unsafe { libc::getegid() } == gid {
        return true;
    }

    // SAFETY: a zero-sized call only reports the group count.
    let count = unsafe { libc::getgroups(0, std::ptr::null_mut()) };
    if count <= 0 {
        return false;
    }
    let mut groups: Vec<libc::gid_t> = vec![0; count as usize];
    // SAFETY: the buffer holds `count` entries.
    let filled = unsafe { libc::getgroups(count, groups.as_mut_ptr()) };
    if filled < 0 {
        return false;
    }
    groups.truncate(filled as usize);
    groups.contains(&gid)
}
