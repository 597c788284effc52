//! Key/value storage abstraction backing the draft store.
//!
//! Provides a trait-based abstraction over a synchronous, capacity-bounded
//! string store to enable:
//! - Unit testing with an in-memory fake
//! - A file-backed store for the CLI
//! - Graceful handling when storage is unavailable or full

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

/// Errors specific to storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage is unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded: {needed} bytes needed, capacity is {capacity}")]
    QuotaExceeded { needed: usize, capacity: usize },

    #[error("storage backend failed: {0}")]
    Backend(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// Synchronous string store with enumerable keys
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored, in no particular order
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Bytes an entry occupies for quota purposes
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}
