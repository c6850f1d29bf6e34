use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors produced by the index engine and its block store.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The file is not an index file or its header is unreadable.
    #[error("invalid index file: {0}")]
    Format(&'static str),
    /// `create` was asked to overwrite an existing file.
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),
    /// The key is already present in the tree.
    #[error("duplicate key: {0}")]
    DuplicateKey(u64),
    /// A block on disk violates the node layout invariants.
    #[error("corruption detected: {0}")]
    Corruption(&'static str),
}
