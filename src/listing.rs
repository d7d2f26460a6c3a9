//! Directory listing engine with traversal defense.
//!
//! Every request path is resolved against the registry's shared roots and
//! re-verified after canonicalization: anything that escapes every root
//! (via `..` or a symlink) is Forbidden, never served.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::common::AppError;
use crate::registry::{PathKind, PathRegistry};

/// One browsable directory entry as it goes over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("path not found")]
    NotFound,
    #[error("path escapes the shared roots")]
    Forbidden,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ListingError> for AppError {
    fn from(err: ListingError) -> Self {
        match err {
            ListingError::NotFound => AppError::NotFound("no such shared path".to_string()),
            ListingError::Forbidden => {
                AppError::Forbidden("path escapes the shared roots".to_string())
            }
            ListingError::Io(io) => AppError::Internal(io.into()),
        }
    }
}

/// List the entries visible at `rel` ("" or "/" is the share root).
pub fn list(registry: &PathRegistry, rel: &str) -> Result<Vec<Entry>, ListingError> {
    let rel = clean_relative(rel)?;

    if rel.as_os_str().is_empty() {
        return Ok(root_listing(registry));
    }

    let dir = resolve(registry, &rel, Target::Directory)?;
    let mut entries = Vec::new();
    for item in std::fs::read_dir(&dir)? {
        let item = item?;
        let meta = item.metadata()?;
        entries.push(Entry {
            name: item.file_name().to_string_lossy().into_owned(),
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            mtime: mtime_secs(&meta),
        });
    }
    sort_entries(&mut entries);
    Ok(entries)
}

/// Resolve `rel` to a servable file. The download endpoint must not open
/// anything that did not come through here.
pub fn resolve_file(registry: &PathRegistry, rel: &str) -> Result<PathBuf, ListingError> {
    let rel = clean_relative(rel)?;
    if rel.as_os_str().is_empty() {
        return Err(ListingError::NotFound);
    }
    resolve(registry, &rel, Target::File)
}

enum Target {
    File,
    Directory,
}

/// Walk the shared roots in registry order and return the first candidate
/// that exists, matches the wanted kind, and stays inside its root after
/// canonicalization. A candidate that exists but escapes poisons the
/// lookup: if nothing legitimate matches, the answer is Forbidden.
fn resolve(
    registry: &PathRegistry,
    rel: &Path,
    target: Target,
) -> Result<PathBuf, ListingError> {
    let mut saw_escape = false;

    for root in registry.list() {
        // kind is re-checked live: a root that was missing at add time
        // starts serving as soon as it appears
        match live_kind(&root.path) {
            PathKind::Missing => continue,
            PathKind::File => {
                // A file root is addressable only by its own leaf name.
                if matches!(target, Target::File)
                    && root.path.file_name().map(Path::new) == Some(rel)
                    && root.path.is_file()
                {
                    return Ok(root.path.clone());
                }
            }
            PathKind::Directory => {
                let candidate = root.path.join(rel);
                if !candidate.exists() {
                    continue;
                }

                let (canon_root, canon_candidate) =
                    match (root.path.canonicalize(), candidate.canonicalize()) {
                        (Ok(r), Ok(c)) => (r, c),
                        _ => continue,
                    };

                if !canon_candidate.starts_with(&canon_root) {
                    tracing::warn!(
                        requested = %rel.display(),
                        resolved = %canon_candidate.display(),
                        "rejected path escaping shared root"
                    );
                    saw_escape = true;
                    continue;
                }

                match target {
                    Target::File if canon_candidate.is_file() => return Ok(canon_candidate),
                    Target::Directory if canon_candidate.is_dir() => return Ok(canon_candidate),
                    _ => continue,
                }
            }
        }
    }

    if saw_escape {
        Err(ListingError::Forbidden)
    } else {
        Err(ListingError::NotFound)
    }
}

/// The share root merges the immediate children of every shared
/// directory with each shared file as a leaf entry. Overlapping roots
/// are not collapsed, so duplicate names can appear.
fn root_listing(registry: &PathRegistry) -> Vec<Entry> {
    let mut entries = Vec::new();
    for root in registry.list() {
        match live_kind(&root.path) {
            PathKind::Missing => continue, // broken share, surfaces as absent
            PathKind::File => {
                let Ok(meta) = std::fs::metadata(&root.path) else {
                    continue;
                };
                let name = root
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| root.path.to_string_lossy().into_owned());
                entries.push(Entry {
                    name,
                    is_dir: false,
                    size: meta.len(),
                    mtime: mtime_secs(&meta),
                });
            }
            PathKind::Directory => {
                let Ok(children) = std::fs::read_dir(&root.path) else {
                    continue;
                };
                for item in children.flatten() {
                    let Ok(meta) = item.metadata() else { continue };
                    entries.push(Entry {
                        name: item.file_name().to_string_lossy().into_owned(),
                        is_dir: meta.is_dir(),
                        size: if meta.is_dir() { 0 } else { meta.len() },
                        mtime: mtime_secs(&meta),
                    });
                }
            }
        }
    }
    sort_entries(&mut entries);
    entries
}

/// Validate and clean a client-supplied relative path.
/// `..`, absolute paths, and null bytes are Forbidden outright; `.`
/// components are dropped.
fn clean_relative(rel: &str) -> Result<PathBuf, ListingError> {
    if rel.contains('\0') {
        return Err(ListingError::Forbidden);
    }

    let mut cleaned = PathBuf::new();
    for component in Path::new(rel.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ListingError::Forbidden)
            }
        }
    }
    Ok(cleaned)
}

fn live_kind(path: &Path) -> PathKind {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => PathKind::Directory,
        Ok(_) => PathKind::File,
        Err(_) => PathKind::Missing,
    }
}

fn sort_entries(entries: &mut [Entry]) {
    // Directories first, then lexicographic; deterministic across runs.
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
}

fn mtime_secs(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
