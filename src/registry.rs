//! The set of filesystem roots the server is willing to serve.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// What a shared root points at. Recorded at add time for display;
/// a path that does not exist yet is kept as `Missing` and simply
/// produces 404s until it appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    File,
    Directory,
    Missing,
}

/// One file or directory root exposed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedPath {
    pub path: PathBuf,
    pub kind: PathKind,
}

impl SharedPath {
    fn new(path: PathBuf) -> Self {
        let kind = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => PathKind::Directory,
            Ok(_) => PathKind::File,
            Err(_) => PathKind::Missing,
        };
        Self { path, kind }
    }
}

/// Insertion-ordered, deduplicated set of shared roots.
///
/// Mutated from the management context only, but read from concurrently
/// running request handlers; all access goes through the lock.
#[derive(Clone, Default)]
pub struct PathRegistry {
    paths: Arc<RwLock<Vec<SharedPath>>>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize to an absolute path and insert if absent.
    /// Duplicates are silent no-ops. Existence is not required: broken
    /// paths surface as 404s at serve time, not as errors at add time.
    pub fn add(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());

        let mut paths = self.write_lock();
        if paths.iter().any(|p| p.path == path) {
            tracing::debug!(path = %path.display(), "share already present, ignoring");
            return;
        }

        let shared = SharedPath::new(path);
        tracing::info!(path = %shared.path.display(), kind = ?shared.kind, "sharing path");
        paths.push(shared);
    }

    /// Remove an exact match; no-op if absent.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let mut paths = self.write_lock();
        let before = paths.len();
        paths.retain(|p| p.path != path);
        if paths.len() != before {
            tracing::info!(path = %path.display(), "unshared path");
        }
    }

    /// Snapshot of the current roots in insertion order.
    pub fn list(&self) -> Vec<SharedPath> {
        self.read_lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Vec<SharedPath>> {
        match self.paths.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("registry lock poisoned during read, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Vec<SharedPath>> {
        match self.paths.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("registry lock poisoned during write, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Make the path absolute without requiring it to exist.
fn normalize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
