//! Permission managers backed by the platform's file mode primitives

use crate::installation::errors::{InstallationError, InstallationResult};
use crate::installation::traits::{InstalledBinary, PermissionManager};
use std::path::Path;
use std::sync::Arc;

/// Mode-bit based permission manager for Unix targets
#[cfg(unix)]
#[derive(Debug, Default, Clone)]
pub struct PosixPermissionManager;

#[cfg(unix)]
impl PosixPermissionManager {
    fn update_mode(&self, path: &Path, update: impl FnOnce(u32) -> u32) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = std::fs::metadata(path)?.permissions();
        let mode = permissions.mode();
        permissions.set_mode(update(mode));
        std::fs::set_permissions(path, permissions)
    }

    fn apply(
        &self,
        path: &Path,
        attribute: &'static str,
        update: impl FnOnce(u32) -> u32,
        verify: impl FnOnce(&InstalledBinary) -> bool,
    ) -> InstallationResult<()> {
        if let Err(e) = self.update_mode(path, update) {
            log::warn!("Setting {} on {} failed: {}", attribute, path.display(), e);
        }

        // The set call may succeed without effect, only the read-back counts.
        if verify(&InstalledBinary::inspect(path)) {
            Ok(())
        } else {
            Err(InstallationError::PermissionNotVerified {
                path: path.to_path_buf(),
                attribute,
            })
        }
    }
}

#[cfg(unix)]
impl PermissionManager for PosixPermissionManager {
    fn ensure_readable(&self, path: &Path) -> InstallationResult<()> {
        self.apply(path, "readable", |mode| mode | 0o444, |b| b.exists && b.readable)
    }

    fn ensure_executable(&self, path: &Path) -> InstallationResult<()> {
        self.apply(path, "executable", |mode| mode | 0o111, |b| b.exists && b.executable)
    }

    fn restrict_writable(&self, path: &Path) -> InstallationResult<()> {
        self.apply(
            path,
            "owner-only-writable",
            |mode| (mode & !0o022) | 0o200,
            |b| b.exists && b.writable && !b.is_shared_writable(),
        )
    }

    fn get_name(&self) -> &'static str {
        "posix"
    }
}

/// Permission manager for targets without Unix mode bits.
///
/// Executability is decided by the platform loader, so only existence and
/// write access can be checked.
#[cfg(not(unix))]
#[derive(Debug, Default, Clone)]
pub struct PortablePermissionManager;

#[cfg(not(unix))]
impl PermissionManager for PortablePermissionManager {
    fn ensure_readable(&self, path: &Path) -> InstallationResult<()> {
        verified(path, "readable", InstalledBinary::inspect(path).readable)
    }

    fn ensure_executable(&self, path: &Path) -> InstallationResult<()> {
        verified(path, "executable", InstalledBinary::inspect(path).executable)
    }

    fn restrict_writable(&self, path: &Path) -> InstallationResult<()> {
        verified(path, "owner-only-writable", InstalledBinary::inspect(path).writable)
    }

    fn get_name(&self) -> &'static str {
        "portable"
    }
}

#[cfg(not(unix))]
fn verified(path: &Path, attribute: &'static str, ok: bool) -> InstallationResult<()> {
    if ok {
        Ok(())
    } else {
        Err(InstallationError::PermissionNotVerified {
            path: path.to_path_buf(),
            attribute,
        })
    }
}

/// Permission manager for the current target
pub fn default_permission_manager() -> Arc<dyn PermissionManager> {
    #[cfg(unix)]
    {
        Arc::new(PosixPermissionManager)
    }

    #[cfg(not(unix))]
    {
        Arc::new(PortablePermissionManager)
    }
}
