//! The storage API for the `slabstore` crate.
//!
//! A [`ChunkStore`] maps n-dimensional chunk indices to variable-length byte blobs held in a [`StorageBackend`].
//! The backend is a flat, byte-addressable region (an in-memory buffer or a file) plus a small metadata slot.
//! Regions released by relocated or erased chunks are tracked by a [`FreeSpaceManager`] and reused.
//!
//! This crate includes two backends:
//!  - [`MemoryBackend`](backend::MemoryBackend): an in-memory buffer with an optional capacity limit, and
//!  - [`FilesystemBackend`](backend::FilesystemBackend): a directory holding a chunk data file and a metadata file.
//!
//! ## Licence
//! `slabstore_storage` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

pub mod backend;
mod byte_region;
mod chunk_locks;
mod chunk_store;
mod free_space;

use std::sync::Arc;

use thiserror::Error;

pub use backend::StorageBackend;
pub use byte_region::ByteRegion;
pub use chunk_locks::ChunkLocks;
pub use chunk_store::{
    ChunkDescriptor, ChunkEncoding, ChunkHandle, ChunkStore, ChunkStoreMetadata, StoredChunk,
};
pub use free_space::{FreeSpaceManager, FreeSpaceMetadata};

/// The indices of a chunk in a chunk grid.
pub type ChunkIndices = Vec<u64>;

/// The type for bytes returned by backends and chunk reads.
///
/// An alias for [`bytes::Bytes`].
pub type Bytes = bytes::Bytes;

/// An alias for bytes which may or may not be available.
pub type MaybeBytes = Option<Bytes>;

/// [`Arc`] wrapped storage backend.
pub type StorageBackendHandle = Arc<dyn StorageBackend>;

/// A storage error.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
    /// The backing store cannot grow to hold the requested region.
    #[error("cannot allocate {requested} bytes, {available} bytes available")]
    Allocation {
        /// The requested region size in bytes.
        requested: u64,
        /// The number of bytes that could still be appended.
        available: u64,
    },
    /// The chunk has never been written.
    #[error("chunk {0:?} has not been written")]
    ChunkNotFound(ChunkIndices),
    /// A read or write extends past the end of the backing store.
    #[error("byte region {0} is out of bounds of a store of {1} bytes")]
    OutOfBounds(ByteRegion, u64),
    /// Stored chunk store metadata is invalid.
    #[error("invalid chunk store metadata: {0}")]
    InvalidMetadata(String),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
