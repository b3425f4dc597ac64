//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// No such node: malformed path, or past the end of the image.
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// I/O error from the backing image.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        assert_eq!(VfsError::not_found("/00").to_string(), "not found: /00");
        assert_eq!(VfsError::is_a_directory("/").to_string(), "is a directory: /");
        assert_eq!(VfsError::ReadOnly.to_string(), "filesystem is read-only");
    }

    #[test]
    fn test_io_error_converts() {
        let err = VfsError::from(io::Error::from_raw_os_error(5));
        assert!(matches!(err, VfsError::Io(ref e) if e.raw_os_error() == Some(5)));
    }
}
