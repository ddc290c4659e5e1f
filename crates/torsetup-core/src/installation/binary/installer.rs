//! Resource installer coordinating reuse, extraction and permission checks

use crate::config::types::InstallerConfig;
use crate::installation::binary::archive::{ArchiveEntry, DistributionArchive};
use crate::installation::binary::extractor::{BinaryExtractor, DEFAULT_BUFFER_SIZE};
use crate::installation::binary::lock::DestinationLock;
use crate::installation::binary::overlay::write_config_overlay;
use crate::installation::binary::permissions::default_permission_manager;
use crate::installation::binary::verifier::InstallationVerifier;
use crate::installation::errors::{InstallationError, InstallationResult};
use crate::installation::traits::{
    ArchitectureId, BinaryNames, BinaryOrigin, InstallOutcome, InstalledBinary, PermissionManager,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default file name of the config overlay inside the install directory
pub const DEFAULT_OVERLAY_NAME: &str = "torrc.custom";

/// Everything a single install attempt needs to know about its environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallContext {
    pub archive_path: PathBuf,
    pub architecture: ArchitectureId,
    pub native_library_dir: Option<PathBuf>,
    pub install_dir: PathBuf,
    pub names: BinaryNames,
    pub overlay_name: String,
    pub buffer_size: usize,
    /// Fall back to extraction when an OS-managed binary cannot be made executable
    pub native_permission_fallback: bool,
}

impl InstallContext {
    pub fn new(archive_path: PathBuf, install_dir: PathBuf, architecture: ArchitectureId) -> Self {
        Self {
            archive_path,
            architecture,
            native_library_dir: None,
            install_dir,
            names: BinaryNames::default(),
            overlay_name: DEFAULT_OVERLAY_NAME.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            native_permission_fallback: true,
        }
    }

    pub fn from_config(config: &InstallerConfig) -> InstallationResult<Self> {
        config.validate().map_err(|e| InstallationError::InvalidConfiguration {
            message: e.to_string(),
        })?;

        let architecture = match &config.architecture {
            Some(id) => ArchitectureId::new(id.clone())?,
            None => ArchitectureId::current(),
        };

        Ok(Self {
            archive_path: config.archive_path.clone(),
            architecture,
            native_library_dir: config.native_library_dir.clone(),
            install_dir: config.install_dir.clone(),
            names: BinaryNames::new(config.binary_name.clone())?,
            overlay_name: config.config_overlay_name.clone(),
            buffer_size: config.buffer_size,
            native_permission_fallback: config.fallback_on_native_permission_failure,
        })
    }

    pub fn with_native_library_dir(mut self, dir: PathBuf) -> Self {
        self.native_library_dir = Some(dir);
        self
    }

    pub fn with_binary_names(mut self, names: BinaryNames) -> Self {
        self.names = names;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_native_permission_fallback(mut self, enabled: bool) -> Self {
        self.native_permission_fallback = enabled;
        self
    }

    /// Private install path of the binary
    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(&self.names.primary)
    }

    pub fn overlay_path(&self) -> PathBuf {
        self.install_dir.join(&self.overlay_name)
    }
}

/// Read-only view over both candidate binary locations
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub architecture: ArchitectureId,
    pub native: Option<InstalledBinary>,
    pub private: InstalledBinary,
    pub active: Option<InstallOutcome>,
}

/// Installs the bundled tor binary and writes its config overlay.
///
/// Clones share the destination lock and the active-binary slot.
#[derive(Debug, Clone)]
pub struct TorResourceInstaller {
    context: InstallContext,
    permissions: Arc<dyn PermissionManager>,
    verifier: InstallationVerifier,
    extractor: BinaryExtractor,
    lock: DestinationLock,
    active: Arc<Mutex<Option<InstallOutcome>>>,
}

impl TorResourceInstaller {
    pub fn new(context: InstallContext) -> Self {
        Self::with_permission_manager(context, default_permission_manager())
    }

    pub fn with_permission_manager(
        context: InstallContext,
        permissions: Arc<dyn PermissionManager>,
    ) -> Self {
        let verifier = InstallationVerifier::new(context.names.clone());
        let extractor =
            BinaryExtractor::new(permissions.clone()).with_buffer_size(context.buffer_size);
        let lock = DestinationLock::for_path(&context.binary_path());
        Self {
            context,
            permissions,
            verifier,
            extractor,
            lock,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &InstallerConfig) -> InstallationResult<Self> {
        Ok(Self::new(InstallContext::from_config(config)?))
    }

    pub fn context(&self) -> &InstallContext {
        &self.context
    }

    pub fn binary_path(&self) -> PathBuf {
        self.context.binary_path()
    }

    pub fn config_overlay_path(&self) -> PathBuf {
        self.context.overlay_path()
    }

    /// Binary selected by the last successful attempt
    pub fn active_binary(&self) -> Option<InstallOutcome> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make an executable tor binary available and return its path.
    ///
    /// Reuses the OS-managed copy when it is (or can be made) executable, then
    /// a verified private copy, and otherwise extracts a fresh one. Attempts on
    /// the same destination run one at a time.
    pub fn install_resources(&self) -> InstallationResult<InstallOutcome> {
        let result = self.locked_attempt();
        self.publish(&result);
        result
    }

    /// Run `install_resources` on the blocking pool, bounded by `timeout`.
    ///
    /// Streaming has no internal cancellation point, so an attempt that
    /// overruns keeps the destination lock until it finishes on its own. Its
    /// result is discarded and never becomes the active binary.
    pub async fn install_resources_with_timeout(
        &self,
        timeout: Duration,
    ) -> InstallationResult<InstallOutcome> {
        let installer = self.clone();
        let task = tokio::task::spawn_blocking(move || installer.locked_attempt());

        let result = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(InstallationError::stream(
                "extract",
                self.context.binary_path(),
                join_error,
            )),
            Err(_) => Err(InstallationError::ExtractionTimeout { timeout }),
        };
        self.publish(&result);
        result
    }

    /// Replace the file at `path` with `content` verbatim
    pub fn write_custom_config(&self, path: &Path, content: &str) -> InstallationResult<()> {
        write_config_overlay(path, content).inspect_err(|e| log::error!("{}", e))
    }

    /// Replace the default overlay file inside the install directory
    pub fn update_config_overlay(&self, content: &str) -> InstallationResult<PathBuf> {
        let path = self.config_overlay_path();
        self.write_custom_config(&path, content)?;
        Ok(path)
    }

    /// Archive entry the installer would extract for this device
    pub fn resolve_entry(&self) -> InstallationResult<Option<ArchiveEntry>> {
        let mut archive = DistributionArchive::open(&self.context.archive_path)?;
        archive.resolve(&self.context.architecture, &self.context.names)
    }

    pub fn inspect(&self) -> InstallReport {
        InstallReport {
            architecture: self.context.architecture.clone(),
            native: self
                .context
                .native_library_dir
                .as_deref()
                .and_then(|dir| self.verifier.find_reusable(dir)),
            private: InstalledBinary::inspect(&self.context.binary_path()),
            active: self.active_binary(),
        }
    }

    fn locked_attempt(&self) -> InstallationResult<InstallOutcome> {
        let _guard = self.lock.acquire();
        log::debug!(
            "Installing tor binary for {} (archive {}, destination {})",
            self.context.architecture,
            self.context.archive_path.display(),
            self.context.binary_path().display()
        );
        self.run_attempt()
    }

    fn publish(&self, result: &InstallationResult<InstallOutcome>) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(outcome) => {
                log::info!("Tor binary ready at {} ({})", outcome.path.display(), outcome.origin);
                *active = Some(outcome.clone());
            }
            Err(e) => {
                log::error!(
                    "Tor binary install failed [{}] for {} at {}: {}",
                    e.kind(),
                    self.context.architecture,
                    self.context.binary_path().display(),
                    e
                );
                *active = None;
            }
        }
    }

    fn run_attempt(&self) -> InstallationResult<InstallOutcome> {
        if let Some(outcome) = self.check_native_binary()? {
            return Ok(outcome);
        }
        if let Some(outcome) = self.check_private_copy() {
            return Ok(outcome);
        }

        let destination = self.context.binary_path();
        self.prepare_install_dir(&destination)?;
        self.extract_fresh(&destination)
    }

    fn check_native_binary(&self) -> InstallationResult<Option<InstallOutcome>> {
        let Some(native_dir) = self.context.native_library_dir.as_deref() else {
            return Ok(None);
        };
        let Some(existing) = self.verifier.find_reusable(native_dir) else {
            return Ok(None);
        };

        let outcome = InstallOutcome {
            path: existing.path.clone(),
            origin: BinaryOrigin::NativeLibrary,
        };
        if existing.executable {
            return Ok(Some(outcome));
        }

        let fixed = self.permissions.ensure_executable(&existing.path).and_then(|_| {
            if InstalledBinary::inspect(&existing.path).executable {
                Ok(())
            } else {
                Err(InstallationError::PermissionNotVerified {
                    path: existing.path.clone(),
                    attribute: "executable",
                })
            }
        });

        match fixed {
            Ok(()) => Ok(Some(outcome)),
            Err(e) if self.context.native_permission_fallback => {
                log::warn!(
                    "Native tor binary at {} is not executable ({}), falling back to extraction",
                    existing.path.display(),
                    e
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn check_private_copy(&self) -> Option<InstallOutcome> {
        let destination = self.context.binary_path();
        if !destination.is_file() {
            return None;
        }

        let verified = DistributionArchive::open(&self.context.archive_path).and_then(|mut archive| {
            match archive.resolve(&self.context.architecture, &self.context.names)? {
                Some(entry) => self.verifier.matches_entry(&destination, &mut archive, &entry),
                None => Ok(false),
            }
        });

        match verified {
            Ok(true) => match self.permissions.restrict_writable(&destination) {
                Ok(()) => Some(InstallOutcome {
                    path: destination,
                    origin: BinaryOrigin::PrivateCopy,
                }),
                Err(e) => {
                    log::warn!("Existing copy at {} not reusable: {}", destination.display(), e);
                    None
                }
            },
            Ok(false) => {
                log::debug!("Existing copy at {} is stale", destination.display());
                None
            }
            Err(e) => {
                log::warn!("Could not verify existing copy at {}: {}", destination.display(), e);
                None
            }
        }
    }

    fn prepare_install_dir(&self, destination: &Path) -> InstallationResult<()> {
        let install_dir = &self.context.install_dir;
        if !install_dir.is_dir() {
            std::fs::create_dir_all(install_dir).map_err(|e| {
                InstallationError::DirectoryPreparationFailed {
                    path: install_dir.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if destination.exists() {
            if let Err(e) = std::fs::remove_file(destination) {
                log::warn!(
                    "Failed to delete stale tor binary at {}: {}",
                    destination.display(),
                    e
                );
            }
        }
        Ok(())
    }

    fn extract_fresh(&self, destination: &Path) -> InstallationResult<InstallOutcome> {
        {
            let mut archive = DistributionArchive::open(&self.context.archive_path)?;
            let entry = archive
                .resolve(&self.context.architecture, &self.context.names)?
                .ok_or_else(|| InstallationError::EntryNotFound {
                    architecture: self.context.architecture.to_string(),
                    archive: self.context.archive_path.clone(),
                })?;
            self.extractor.extract(&mut archive, &entry, destination)?;
        }

        if !InstalledBinary::inspect(destination).is_usable() {
            return Err(InstallationError::PermissionNotVerified {
                path: destination.to_path_buf(),
                attribute: "executable",
            });
        }

        Ok(InstallOutcome {
            path: destination.to_path_buf(),
            origin: BinaryOrigin::Fresh,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        make_executable, make_non_executable, write_archive, RefusingPermissionManager,
        SlowPermissionManager,
    };
    use std::fs;
    use tempfile::tempdir;

    struct Fixture {
        _temp_dir: tempfile::TempDir,
        root: PathBuf,
        archive: PathBuf,
        native: PathBuf,
        install: PathBuf,
    }

    fn fixture(entries: &[(&str, &[u8])]) -> Fixture {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_path_buf();
        let archive = root.join("app.apk");
        write_archive(&archive, entries);
        let native = root.join("native");
        let install = root.join("files").join("torfiles");
        Fixture {
            _temp_dir: temp_dir,
            root,
            archive,
            native,
            install,
        }
    }

    fn context(fx: &Fixture, arch: &str) -> InstallContext {
        InstallContext::new(
            fx.archive.clone(),
            fx.install.clone(),
            ArchitectureId::new(arch).unwrap(),
        )
        .with_native_library_dir(fx.native.clone())
    }

    #[test]
    fn test_fresh_install_creates_directory_and_binary() {
        let fx = fixture(&[("lib/arm64-v8a/tor.so", b"tor binary".as_slice())]);
        let installer = TorResourceInstaller::new(context(&fx, "arm64-v8a"));

        let outcome = installer.install_resources().unwrap();
        assert_eq!(outcome.origin, BinaryOrigin::Fresh);
        assert_eq!(outcome.path, fx.install.join("tor.so"));
        assert_eq!(fs::read(&outcome.path).unwrap(), b"tor binary");
        assert!(InstalledBinary::inspect(&outcome.path).is_usable());
        assert_eq!(installer.active_binary(), Some(outcome));
    }

    #[test]
    fn test_executable_native_binary_skips_private_dir() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        fs::create_dir_all(&fx.native).unwrap();
        let native_bin = fx.native.join("libtor.so");
        fs::write(&native_bin, b"system").unwrap();
        make_executable(&native_bin);

        let installer = TorResourceInstaller::new(context(&fx, "x86"));
        let outcome = installer.install_resources().unwrap();

        assert_eq!(outcome.path, native_bin);
        assert_eq!(outcome.origin, BinaryOrigin::NativeLibrary);
        assert!(!fx.install.exists());
    }

    #[test]
    fn test_native_binary_is_fixed_in_place() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        fs::create_dir_all(&fx.native).unwrap();
        let native_bin = fx.native.join("tor.so");
        fs::write(&native_bin, b"system").unwrap();
        make_non_executable(&native_bin);

        let installer = TorResourceInstaller::new(context(&fx, "x86"));
        let outcome = installer.install_resources().unwrap();

        assert_eq!(outcome.path, native_bin);
        assert!(outcome.reused());
        assert!(!fx.install.exists());
    }

    #[test]
    fn test_unfixable_native_binary_falls_back_to_extraction() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        fs::create_dir_all(&fx.native).unwrap();
        let native_bin = fx.native.join("tor.so");
        fs::write(&native_bin, b"system").unwrap();
        make_non_executable(&native_bin);

        let permissions = Arc::new(RefusingPermissionManager::under(&fx.native));
        let installer =
            TorResourceInstaller::with_permission_manager(context(&fx, "x86"), permissions);
        let outcome = installer.install_resources().unwrap();

        assert_eq!(outcome.origin, BinaryOrigin::Fresh);
        assert_eq!(outcome.path, fx.install.join("tor.so"));
        assert_eq!(fs::read(&outcome.path).unwrap(), b"bundled");
    }

    #[test]
    fn test_unfixable_native_binary_without_fallback_fails() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        fs::create_dir_all(&fx.native).unwrap();
        let native_bin = fx.native.join("tor.so");
        fs::write(&native_bin, b"system").unwrap();
        make_non_executable(&native_bin);

        let permissions = Arc::new(RefusingPermissionManager::under(&fx.native));
        let ctx = context(&fx, "x86").with_native_permission_fallback(false);
        let installer = TorResourceInstaller::with_permission_manager(ctx, permissions);
        let err = installer.install_resources().unwrap_err();

        assert_eq!(err.kind(), "permission-not-verified");
        assert!(!fx.install.exists());
        assert!(installer.active_binary().is_none());
    }

    #[test]
    fn test_missing_entry_leaves_no_file() {
        let fx = fixture(&[("lib/x86_64/tor.so", b"bundled".as_slice())]);
        let installer = TorResourceInstaller::new(context(&fx, "mips"));

        let err = installer.install_resources().unwrap_err();
        assert_eq!(err.kind(), "entry-not-found");
        assert!(!fx.install.join("tor.so").exists());
    }

    #[test]
    fn test_stale_private_copy_is_replaced() {
        let fx = fixture(&[("jni/x86/libtor.so", b"current build".as_slice())]);
        fs::create_dir_all(&fx.install).unwrap();
        let stale = fx.install.join("tor.so");
        fs::write(&stale, b"partial").unwrap();
        make_executable(&stale);

        let installer = TorResourceInstaller::new(context(&fx, "x86"));
        let outcome = installer.install_resources().unwrap();

        assert_eq!(outcome.origin, BinaryOrigin::Fresh);
        assert_eq!(fs::read(&stale).unwrap(), b"current build");
    }

    #[test]
    fn test_second_call_reuses_private_copy() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        let installer = TorResourceInstaller::new(context(&fx, "x86"));

        let first = installer.install_resources().unwrap();
        let second = installer.install_resources().unwrap();

        assert_eq!(first.origin, BinaryOrigin::Fresh);
        assert_eq!(second.origin, BinaryOrigin::PrivateCopy);
        assert_eq!(first.path, second.path);
    }

    #[cfg(unix)]
    #[test]
    fn test_reused_private_copy_is_not_shared_writable() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        let installer = TorResourceInstaller::new(context(&fx, "x86"));

        let first = installer.install_resources().unwrap();
        fs::set_permissions(&first.path, fs::Permissions::from_mode(0o777)).unwrap();

        let second = installer.install_resources().unwrap();
        assert_eq!(second.origin, BinaryOrigin::PrivateCopy);
        let mode = fs::metadata(&second.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o022, 0);
        assert!(InstalledBinary::inspect(&second.path).is_usable());
    }

    #[test]
    fn test_install_dir_blocked_by_file() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        fs::create_dir_all(fx.install.parent().unwrap()).unwrap();
        fs::write(&fx.install, b"not a directory").unwrap();

        let installer = TorResourceInstaller::new(context(&fx, "x86"));
        let err = installer.install_resources().unwrap_err();
        assert_eq!(err.kind(), "directory-preparation-failed");
    }

    #[test]
    fn test_unreadable_archive_is_reported() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        fs::write(&fx.archive, b"garbage").unwrap();

        let installer = TorResourceInstaller::new(context(&fx, "x86"));
        let err = installer.install_resources().unwrap_err();
        assert_eq!(err.kind(), "archive-unreadable");
        assert!(err.is_extraction_failure());
    }

    #[test]
    fn test_update_config_overlay_uses_install_dir() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        fs::create_dir_all(&fx.install).unwrap();
        let installer = TorResourceInstaller::new(context(&fx, "x86"));

        let path = installer.update_config_overlay("ClientOnly 1\n").unwrap();
        assert_eq!(path, fx.install.join("torrc.custom"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "ClientOnly 1\n");

        let custom = fx.root.join("other.conf");
        installer.write_custom_config(&custom, "x").unwrap();
        assert_eq!(fs::read_to_string(&custom).unwrap(), "x");
    }

    #[test]
    fn test_inspect_reports_both_locations() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        let installer = TorResourceInstaller::new(context(&fx, "x86"));

        let before = installer.inspect();
        assert!(before.native.is_none());
        assert!(!before.private.exists);
        assert!(before.active.is_none());

        installer.install_resources().unwrap();
        let after = installer.inspect();
        assert!(after.private.is_usable());
        assert_eq!(after.active.unwrap().origin, BinaryOrigin::Fresh);
    }

    #[tokio::test]
    async fn test_install_with_timeout_succeeds() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        let installer = TorResourceInstaller::new(context(&fx, "x86"));

        let outcome = installer
            .install_resources_with_timeout(Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(outcome.origin, BinaryOrigin::Fresh);
        assert_eq!(installer.active_binary(), Some(outcome));
    }

    #[tokio::test]
    async fn test_install_with_timeout_expires() {
        let fx = fixture(&[("lib/x86/tor.so", b"bundled".as_slice())]);
        let permissions = Arc::new(SlowPermissionManager::new(Duration::from_millis(500)));
        let installer =
            TorResourceInstaller::with_permission_manager(context(&fx, "x86"), permissions);

        let err = installer
            .install_resources_with_timeout(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "extraction-timeout");
        assert!(err.to_string().contains("50ms"));

        // Waits for the detached attempt, which must not publish its result.
        drop(installer.lock.acquire());
        assert!(installer.active_binary().is_none());
        assert!(InstalledBinary::inspect(&installer.binary_path()).is_usable());

        let outcome = installer.install_resources().unwrap();
        assert_eq!(outcome.origin, BinaryOrigin::PrivateCopy);
        assert_eq!(installer.active_binary(), Some(outcome));
    }
}
