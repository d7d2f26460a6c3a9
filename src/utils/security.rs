//! Upload filename validation.

use std::fmt;
use std::path::{Component, Path};

#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    ContainsSeparator,
    ContainsParentDir,
    AbsolutePath,
    NullByte,
    Empty,
}

impl fmt::Display for FilenameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilenameError::ContainsSeparator => write!(f, "name contains a path separator"),
            FilenameError::ContainsParentDir => write!(f, "name contains parent directory (..)"),
            FilenameError::AbsolutePath => write!(f, "name is an absolute path"),
            FilenameError::NullByte => write!(f, "name contains a null byte"),
            FilenameError::Empty => write!(f, "name is empty"),
        }
    }
}

impl std::error::Error for FilenameError {}

/// Validate an uploaded file name.
///
/// Uploads land directly in the receive directory, so the name must be a
/// single normal path component: no separators, no `..`, no absolute
/// paths, no null bytes.
pub fn validate_upload_filename(name: &str) -> Result<(), FilenameError> {
    if name.is_empty() {
        return Err(FilenameError::Empty);
    }

    // a \0 can truncate the name at the OS boundary
    if name.contains('\0') {
        return Err(FilenameError::NullByte);
    }

    if name == ".." {
        return Err(FilenameError::ContainsParentDir);
    }

    // reject both separators regardless of host OS; the sender may be
    // a Windows peer
    if name.contains('/') || name.contains('\\') {
        if name.starts_with('/') || name.starts_with('\\') {
            return Err(FilenameError::AbsolutePath);
        }
        if Path::new(name)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(FilenameError::ContainsParentDir);
        }
        return Err(FilenameError::ContainsSeparator);
    }

    match Path::new(name).components().next() {
        Some(Component::Normal(_)) => Ok(()),
        Some(Component::ParentDir) => Err(FilenameError::ContainsParentDir),
        Some(Component::RootDir) | Some(Component::Prefix(_)) => Err(FilenameError::AbsolutePath),
        _ => Err(FilenameError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_directory_traversal() {
        assert_eq!(
            validate_upload_filename("../../evil.txt"),
            Err(FilenameError::ContainsParentDir)
        );
        assert_eq!(
            validate_upload_filename(".."),
            Err(FilenameError::ContainsParentDir)
        );
        assert_eq!(
            validate_upload_filename("dir/../evil.txt"),
            Err(FilenameError::ContainsParentDir)
        );
    }

    #[test]
    fn rejects_separators_and_absolute_paths() {
        assert_eq!(
            validate_upload_filename("dir/file.txt"),
            Err(FilenameError::ContainsSeparator)
        );
        assert_eq!(
            validate_upload_filename("dir\\file.txt"),
            Err(FilenameError::ContainsSeparator)
        );
        assert_eq!(
            validate_upload_filename("/etc/passwd"),
            Err(FilenameError::AbsolutePath)
        );
        assert_eq!(
            validate_upload_filename("\\\\host\\share"),
            Err(FilenameError::AbsolutePath)
        );
    }

    #[test]
    fn rejects_null_bytes_and_empty_names() {
        assert_eq!(
            validate_upload_filename("file\0.txt"),
            Err(FilenameError::NullByte)
        );
        assert_eq!(validate_upload_filename(""), Err(FilenameError::Empty));
    }

    #[test]
    fn accepts_ordinary_names() {
        assert!(validate_upload_filename("report.pdf").is_ok());
        assert!(validate_upload_filename("with spaces.txt").is_ok());
        assert!(validate_upload_filename(".hidden").is_ok());
        assert!(validate_upload_filename("archive.tar.gz").is_ok());
    }
}
