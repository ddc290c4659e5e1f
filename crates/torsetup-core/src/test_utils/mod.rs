//! Fixtures shared by the unit tests

use crate::installation::binary::permissions::default_permission_manager;
use crate::installation::errors::{InstallationError, InstallationResult};
use crate::installation::traits::PermissionManager;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a deflate-compressed zip at `path` holding `entries`
pub fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

pub fn make_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    #[cfg(not(unix))]
    let _ = path;
}

pub fn make_non_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).unwrap();
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Permission manager whose calls silently do nothing for paths under `root`
/// (or everywhere) and delegate to the platform manager elsewhere
#[derive(Debug)]
pub struct RefusingPermissionManager {
    root: Option<PathBuf>,
    fallback: Arc<dyn PermissionManager>,
}

impl RefusingPermissionManager {
    pub fn everywhere() -> Self {
        Self {
            root: None,
            fallback: default_permission_manager(),
        }
    }

    pub fn under(root: &Path) -> Self {
        Self {
            root: Some(root.to_path_buf()),
            fallback: default_permission_manager(),
        }
    }

    fn refuses(&self, path: &Path) -> bool {
        self.root.as_ref().map_or(true, |root| path.starts_with(root))
    }

    fn check(
        &self,
        path: &Path,
        attribute: &'static str,
        delegate: impl FnOnce(&dyn PermissionManager) -> InstallationResult<()>,
    ) -> InstallationResult<()> {
        if self.refuses(path) {
            Err(InstallationError::PermissionNotVerified {
                path: path.to_path_buf(),
                attribute,
            })
        } else {
            delegate(self.fallback.as_ref())
        }
    }
}

impl PermissionManager for RefusingPermissionManager {
    fn ensure_readable(&self, path: &Path) -> InstallationResult<()> {
        self.check(path, "readable", |m| m.ensure_readable(path))
    }

    fn ensure_executable(&self, path: &Path) -> InstallationResult<()> {
        self.check(path, "executable", |m| m.ensure_executable(path))
    }

    fn restrict_writable(&self, path: &Path) -> InstallationResult<()> {
        self.check(path, "owner-only-writable", |m| m.restrict_writable(path))
    }

    fn get_name(&self) -> &'static str {
        "refusing"
    }
}

/// Platform permission manager that stalls before every executable fix,
/// holding an attempt inside extraction for `delay`
#[derive(Debug)]
pub struct SlowPermissionManager {
    delay: Duration,
    inner: Arc<dyn PermissionManager>,
}

impl SlowPermissionManager {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: default_permission_manager(),
        }
    }
}

impl PermissionManager for SlowPermissionManager {
    fn ensure_readable(&self, path: &Path) -> InstallationResult<()> {
        self.inner.ensure_readable(path)
    }

    fn ensure_executable(&self, path: &Path) -> InstallationResult<()> {
        std::thread::sleep(self.delay);
        self.inner.ensure_executable(path)
    }

    fn restrict_writable(&self, path: &Path) -> InstallationResult<()> {
        self.inner.restrict_writable(path)
    }

    fn get_name(&self) -> &'static str {
        "slow"
    }
}
