//! Backing stores for a [`ChunkStore`](crate::ChunkStore).
//!
//! A backend is a flat byte-addressable region that can grow and shrink, plus a single metadata slot.

mod filesystem_backend;
mod memory_backend;

pub use filesystem_backend::{FilesystemBackend, FilesystemBackendCreateError};
pub use memory_backend::MemoryBackend;

use auto_impl::auto_impl;

use crate::{Bytes, MaybeBytes, StorageError};

/// Traits for a byte-addressable backing store.
#[auto_impl(Arc)]
pub trait StorageBackend: Send + Sync {
    /// Read `length` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the region is out of bounds or there is an underlying IO error.
    fn read_at(&self, offset: u64, length: u64) -> Result<Bytes, StorageError>;

    /// Write `value` starting at `offset`, growing the store if necessary.
    ///
    /// # Errors
    /// Returns a [`StorageError`] on an underlying IO error or if the store cannot grow.
    fn write_at(&self, offset: u64, value: &[u8]) -> Result<(), StorageError>;

    /// The current size of the store in bytes.
    ///
    /// # Errors
    /// Returns a [`StorageError`] on an underlying IO error.
    fn size(&self) -> Result<u64, StorageError>;

    /// Truncate (or extend with zeros) the store to `size` bytes.
    ///
    /// # Errors
    /// Returns a [`StorageError`] on an underlying IO error.
    fn truncate(&self, size: u64) -> Result<(), StorageError>;

    /// The maximum size of the store in bytes, if limited.
    fn capacity(&self) -> Option<u64> {
        None
    }

    /// Persist any buffered writes.
    ///
    /// # Errors
    /// Returns a [`StorageError`] on an underlying IO error.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Retrieve the metadata document, if one has been stored.
    ///
    /// # Errors
    /// Returns a [`StorageError`] on an underlying IO error.
    fn get_metadata(&self) -> Result<MaybeBytes, StorageError>;

    /// Replace the metadata document.
    ///
    /// # Errors
    /// Returns a [`StorageError`] on an underlying IO error.
    fn set_metadata(&self, value: Bytes) -> Result<(), StorageError>;
}
