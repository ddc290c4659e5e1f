//! Mutual exclusion for install attempts sharing a destination

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

type LockTable = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

fn table() -> &'static LockTable {
    static TABLE: OnceLock<LockTable> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Lock handle keyed by an install destination.
///
/// Installers pointing at the same destination share one handle, so their
/// attempts run one at a time even across separate installer instances.
#[derive(Debug, Clone)]
pub struct DestinationLock {
    key: PathBuf,
    inner: Arc<Mutex<()>>,
}

impl DestinationLock {
    pub fn for_path(destination: &Path) -> Self {
        let key = normalize(destination);
        let mut locks = table().lock().unwrap_or_else(PoisonError::into_inner);
        let inner = locks.entry(key.clone()).or_default().clone();
        Self { key, inner }
    }

    /// Block until no other attempt holds this destination.
    ///
    /// A poisoned lock is recovered: the guarded state lives on disk and every
    /// attempt re-verifies it.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        log::debug!("Waiting for install lock on {}", self.key.display());
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(&self) -> &Path {
        &self.key
    }

    pub fn shares_with(&self, other: &DestinationLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// Not canonicalized: the destination may not exist yet, and the key must not
// change once it does.
fn normalize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
