//! A synchronous in-memory backend.

use parking_lot::{Mutex, RwLock};

use crate::{ByteRegion, Bytes, MaybeBytes, StorageBackend, StorageError};

/// A synchronous in-memory backend.
///
/// An optional capacity limits how far the store can grow.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<Vec<u8>>,
    metadata: Mutex<MaybeBytes>,
    capacity: Option<u64>,
}

impl MemoryBackend {
    /// Create a new unbounded memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new memory backend that cannot grow beyond `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    fn usize(value: u64) -> Result<usize, StorageError> {
        usize::try_from(value).map_err(|_| StorageError::Other(format!("{value} exceeds usize")))
    }
}

impl StorageBackend for MemoryBackend {
    fn read_at(&self, offset: u64, length: u64) -> Result<Bytes, StorageError> {
        let data = self.data.read();
        let region = ByteRegion::new(offset, length);
        if region.end() > data.len() as u64 {
            return Err(StorageError::OutOfBounds(region, data.len() as u64));
        }
        let start = Self::usize(offset)?;
        let end = Self::usize(region.end())?;
        Ok(Bytes::copy_from_slice(&data[start..end]))
    }

    fn write_at(&self, offset: u64, value: &[u8]) -> Result<(), StorageError> {
        let region = ByteRegion::new(offset, value.len() as u64);
        if let Some(capacity) = self.capacity
            && region.end() > capacity
        {
            return Err(StorageError::Allocation {
                requested: region.size,
                available: capacity.saturating_sub(offset),
            });
        }
        let mut data = self.data.write();
        let end = Self::usize(region.end())?;
        if data.len() < end {
            data.resize(end, 0);
        }
        let start = Self::usize(offset)?;
        data[start..end].copy_from_slice(value);
        Ok(())
    }

    fn size(&self) -> Result<u64, StorageError> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&self, size: u64) -> Result<(), StorageError> {
        let size = Self::usize(size)?;
        self.data.write().resize(size, 0);
        Ok(())
    }

    fn capacity(&self) -> Option<u64> {
        self.capacity
    }

    fn get_metadata(&self) -> Result<MaybeBytes, StorageError> {
        Ok(self.metadata.lock().clone())
    }

    fn set_metadata(&self, value: Bytes) -> Result<(), StorageError> {
        *self.metadata.lock() = Some(value);
        Ok(())
    }
}
