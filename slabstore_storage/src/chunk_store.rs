//! The chunk store.

use std::{collections::BTreeMap, sync::Arc};

use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::{
    ByteRegion, Bytes, ChunkIndices, ChunkLocks, FreeSpaceManager, FreeSpaceMetadata,
    StorageBackend, StorageError,
};

/// How the stored bytes of a chunk were encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEncoding {
    /// The size of the chunk in bytes before encoding.
    pub decoded_size: u64,
    /// The codec names applied to the chunk, in encode order.
    pub codecs: Vec<String>,
}

/// The location and encoding of a chunk in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    /// The region of the backing store holding the chunk.
    pub region: ByteRegion,
    /// The encoding of the stored bytes.
    ///
    /// [`None`] if the region is reserved but nothing has been written.
    pub encoding: Option<ChunkEncoding>,
}

/// A handle to an allocated chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
    indices: ChunkIndices,
}

impl ChunkHandle {
    /// The chunk indices.
    #[must_use]
    pub fn indices(&self) -> &[u64] {
        &self.indices
    }
}

/// The stored bytes of a chunk with their encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChunk {
    /// The encoded bytes.
    pub bytes: Bytes,
    /// The encoding of `bytes`.
    pub encoding: ChunkEncoding,
}

/// The serialisable state of a [`ChunkStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStoreMetadata {
    /// The chunk directory.
    pub chunks: Vec<(ChunkIndices, ChunkDescriptor)>,
    /// The free-space state.
    pub free_space: FreeSpaceMetadata,
}

/// A store of variable-length chunks in a [`StorageBackend`].
///
/// The chunk directory maps chunk indices to descriptors.
/// Directory mutations (allocate, relocate, erase) are serialised against directory reads.
/// Callers performing a read-modify-write on a chunk should hold its [`chunk_lock`](ChunkStore::chunk_lock) for writing.
#[derive(Debug)]
pub struct ChunkStore<TBackend: ?Sized> {
    backend: Arc<TBackend>,
    directory: RwLock<BTreeMap<ChunkIndices, ChunkDescriptor>>,
    free_space: Mutex<FreeSpaceManager>,
    locks: ChunkLocks,
}

impl<TBackend: ?Sized + StorageBackend> ChunkStore<TBackend> {
    /// Create an empty chunk store.
    ///
    /// Any existing content of the backend is discarded.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the backend cannot be truncated.
    pub fn new(backend: Arc<TBackend>) -> Result<Self, StorageError> {
        backend.truncate(0)?;
        let free_space = FreeSpaceManager::new(backend.capacity());
        Ok(Self {
            backend,
            directory: RwLock::default(),
            free_space: Mutex::new(free_space),
            locks: ChunkLocks::new(),
        })
    }

    /// Restore a chunk store from its serialised state.
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidMetadata`] if chunk regions overlap each other or free regions, or lie beyond the end of the store.
    pub fn from_metadata(
        backend: Arc<TBackend>,
        metadata: ChunkStoreMetadata,
    ) -> Result<Self, StorageError> {
        let free_space = FreeSpaceManager::from_metadata(&metadata.free_space, backend.capacity())?;
        let end_of_store = free_space.end_of_store();
        let backend_size = backend.size()?;
        if backend_size < end_of_store {
            return Err(StorageError::InvalidMetadata(format!(
                "the backend holds {backend_size} bytes, expected at least {end_of_store}"
            )));
        }

        let mut regions = metadata
            .chunks
            .iter()
            .map(|(_, descriptor)| descriptor.region)
            .chain(free_space.free_regions())
            .filter(|region| !region.is_empty())
            .collect::<Vec<_>>();
        regions.sort();
        if let Some((a, b)) = regions.iter().tuple_windows().find(|(a, b)| a.overlaps(b)) {
            return Err(StorageError::InvalidMetadata(format!(
                "byte regions {a} and {b} overlap"
            )));
        }
        if let Some(region) = regions.last()
            && region.end() > end_of_store
        {
            return Err(StorageError::InvalidMetadata(format!(
                "byte region {region} is beyond the end of the store ({end_of_store})"
            )));
        }

        let directory: BTreeMap<_, _> = metadata.chunks.into_iter().collect();
        log::debug!(
            "restored chunk store with {} chunks and {} free bytes",
            directory.len(),
            free_space.free_bytes()
        );
        Ok(Self {
            backend,
            directory: RwLock::new(directory),
            free_space: Mutex::new(free_space),
            locks: ChunkLocks::new(),
        })
    }

    /// Return the serialisable state of the chunk store.
    #[must_use]
    pub fn metadata(&self) -> ChunkStoreMetadata {
        let directory = self.directory.read();
        let free_space = self.free_space.lock().metadata();
        ChunkStoreMetadata {
            chunks: directory
                .iter()
                .map(|(indices, descriptor)| (indices.clone(), descriptor.clone()))
                .collect(),
            free_space,
        }
    }

    /// Return the backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<TBackend> {
        &self.backend
    }

    /// Return the lock for the chunk at `chunk_indices`.
    #[must_use]
    pub fn chunk_lock(&self, chunk_indices: &[u64]) -> Arc<RwLock<()>> {
        self.locks.get(chunk_indices)
    }

    /// Return the descriptor of the chunk at `chunk_indices`, if allocated.
    #[must_use]
    pub fn lookup(&self, chunk_indices: &[u64]) -> Option<ChunkDescriptor> {
        self.directory.read().get(chunk_indices).cloned()
    }

    /// Returns true if storage has been allocated for the chunk at `chunk_indices`.
    #[must_use]
    pub fn is_allocated(&self, chunk_indices: &[u64]) -> bool {
        self.directory.read().contains_key(chunk_indices)
    }

    /// The number of chunks with allocated storage.
    #[must_use]
    pub fn num_allocated(&self) -> usize {
        self.directory.read().len()
    }

    /// The total number of bytes allocated to chunks.
    #[must_use]
    pub fn stored_bytes(&self) -> u64 {
        self.directory
            .read()
            .values()
            .map(|descriptor| descriptor.region.size)
            .sum()
    }

    /// The indices of all allocated chunks.
    #[must_use]
    pub fn chunk_indices(&self) -> Vec<ChunkIndices> {
        self.directory.read().keys().cloned().collect()
    }

    /// Return a handle to the chunk at `chunk_indices`, reserving `size` bytes of storage if it is not allocated.
    ///
    /// `size` is typically the worst-case encoded size of the chunk.
    ///
    /// # Errors
    /// Returns [`StorageError::Allocation`] if the backing store cannot grow.
    pub fn get_or_allocate(
        &self,
        chunk_indices: &[u64],
        size: u64,
    ) -> Result<ChunkHandle, StorageError> {
        let handle = ChunkHandle {
            indices: chunk_indices.to_vec(),
        };
        let mut directory = self.directory.write();
        if directory.contains_key(chunk_indices) {
            return Ok(handle);
        }
        let region = self.free_space.lock().allocate(size)?;
        log::trace!("reserved {region} for chunk {chunk_indices:?}");
        directory.insert(
            handle.indices.clone(),
            ChunkDescriptor {
                region,
                encoding: None,
            },
        );
        Ok(handle)
    }

    /// Read the stored bytes of a chunk.
    ///
    /// # Errors
    /// Returns [`StorageError::ChunkNotFound`] if the chunk has never been written, or a backend error.
    pub fn read(&self, handle: &ChunkHandle) -> Result<StoredChunk, StorageError> {
        self.retrieve(handle.indices())?
            .ok_or_else(|| StorageError::ChunkNotFound(handle.indices.clone()))
    }

    /// Read the stored bytes of the chunk at `chunk_indices`.
    ///
    /// Returns [`None`] if the chunk has never been written.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the backend read fails.
    pub fn retrieve(&self, chunk_indices: &[u64]) -> Result<Option<StoredChunk>, StorageError> {
        // the directory read lock is held so the region cannot be released during the read
        let directory = self.directory.read();
        let Some(ChunkDescriptor {
            region,
            encoding: Some(encoding),
        }) = directory.get(chunk_indices)
        else {
            return Ok(None);
        };
        let bytes = self.backend.read_at(region.offset, region.size)?;
        log::trace!("read chunk {chunk_indices:?} from {region}");
        Ok(Some(StoredChunk {
            bytes,
            encoding: encoding.clone(),
        }))
    }

    /// Replace the stored bytes of a chunk.
    ///
    /// A region reserved by [`get_or_allocate`](ChunkStore::get_or_allocate) that holds no chunk yet is written in place if the size matches.
    /// Otherwise the bytes are written to a newly allocated region, the directory is updated, and only then is the old region released.
    /// On failure the previous content of the chunk is untouched.
    ///
    /// # Errors
    /// Returns [`StorageError::Allocation`] if the backing store cannot grow, or a backend error.
    pub fn write(
        &self,
        handle: &ChunkHandle,
        bytes: &[u8],
        encoding: ChunkEncoding,
    ) -> Result<(), StorageError> {
        let size = bytes.len() as u64;
        {
            let mut directory = self.directory.write();
            if let Some(descriptor) = directory.get_mut(handle.indices())
                && descriptor.encoding.is_none()
                && descriptor.region.size == size
            {
                self.backend.write_at(descriptor.region.offset, bytes)?;
                log::trace!(
                    "wrote chunk {:?} to reserved {}",
                    handle.indices,
                    descriptor.region
                );
                descriptor.encoding = Some(encoding);
                return Ok(());
            }
        }

        let region = self.free_space.lock().allocate(size)?;
        if let Err(err) = self.backend.write_at(region.offset, bytes) {
            if let Err(release_err) = self.free_space.lock().release(region) {
                log::error!("failed to release {region} after a failed chunk write: {release_err}");
            }
            return Err(err);
        }
        let previous = self.directory.write().insert(
            handle.indices.clone(),
            ChunkDescriptor {
                region,
                encoding: Some(encoding),
            },
        );
        if let Some(previous) = previous {
            log::debug!(
                "relocated chunk {:?} from {} to {}",
                handle.indices,
                previous.region,
                region
            );
            self.free_space.lock().release(previous.region)?;
        } else {
            log::trace!("wrote chunk {:?} to {}", handle.indices, region);
        }
        Ok(())
    }

    /// Allocate and write the chunk at `chunk_indices`.
    ///
    /// # Errors
    /// See [`write`](ChunkStore::write).
    pub fn store(
        &self,
        chunk_indices: &[u64],
        bytes: &[u8],
        encoding: ChunkEncoding,
    ) -> Result<(), StorageError> {
        let handle = ChunkHandle {
            indices: chunk_indices.to_vec(),
        };
        self.write(&handle, bytes, encoding)
    }

    /// Erase the chunk at `chunk_indices`, releasing its storage.
    ///
    /// Returns true if the chunk was allocated.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the free-space state is inconsistent.
    pub fn erase(&self, chunk_indices: &[u64]) -> Result<bool, StorageError> {
        let previous = self.directory.write().remove(chunk_indices);
        if let Some(previous) = previous {
            self.free_space.lock().release(previous.region)?;
            log::trace!("erased chunk {chunk_indices:?}");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Trim the backend to the end of the store and flush it.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the backend fails to truncate or flush.
    pub fn flush(&self) -> Result<(), StorageError> {
        let end_of_store = self.free_space.lock().end_of_store();
        if self.backend.size()? > end_of_store {
            self.backend.truncate(end_of_store)?;
        }
        self.backend.flush()?;
        self.locks.prune();
        Ok(())
    }
}
