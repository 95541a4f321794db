//! Free-space management for a backing store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{ByteRegion, StorageError};

/// Tracks free regions of a backing store and hands out regions for new chunk data.
///
/// Free regions are indexed by offset (for coalescing) and by power-of-two size class (for allocation).
/// Allocation is best-fit: the smallest free region at least as large as the request is split, otherwise the store is extended.
/// Released regions are merged with adjacent free neighbours, and a free region touching the end of the store shrinks the store instead.
#[derive(Debug, Clone, Default)]
pub struct FreeSpaceManager {
    free_by_offset: BTreeMap<u64, u64>,
    size_classes: BTreeMap<u32, BTreeSet<(u64, u64)>>,
    end_of_store: u64,
    capacity: Option<u64>,
}

/// The serialisable state of a [`FreeSpaceManager`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSpaceMetadata {
    /// The offset one past the last allocated byte.
    pub end_of_store: u64,
    /// The free regions below `end_of_store`.
    pub free_regions: Vec<ByteRegion>,
}

fn size_class(size: u64) -> u32 {
    63 - size.leading_zeros()
}

impl FreeSpaceManager {
    /// Create a free-space manager for an empty store.
    #[must_use]
    pub fn new(capacity: Option<u64>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Restore a free-space manager from its serialised state.
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidMetadata`] if free regions overlap or extend beyond the end of the store.
    pub fn from_metadata(
        metadata: &FreeSpaceMetadata,
        capacity: Option<u64>,
    ) -> Result<Self, StorageError> {
        let mut manager = Self::new(capacity);
        manager.end_of_store = metadata.end_of_store;
        let mut regions = metadata.free_regions.clone();
        regions.sort();
        let mut previous_end = 0;
        for region in regions {
            if region.offset < previous_end || region.end() > metadata.end_of_store {
                return Err(StorageError::InvalidMetadata(format!(
                    "free region {region} is invalid"
                )));
            }
            previous_end = region.end();
            manager.release(region)?;
        }
        Ok(manager)
    }

    /// Return the serialisable state of the manager.
    #[must_use]
    pub fn metadata(&self) -> FreeSpaceMetadata {
        FreeSpaceMetadata {
            end_of_store: self.end_of_store,
            free_regions: self.free_regions().collect(),
        }
    }

    /// The offset one past the last allocated byte.
    #[must_use]
    pub fn end_of_store(&self) -> u64 {
        self.end_of_store
    }

    /// The maximum size of the store, if limited.
    #[must_use]
    pub fn capacity(&self) -> Option<u64> {
        self.capacity
    }

    /// Iterate over the free regions in order of offset.
    pub fn free_regions(&self) -> impl Iterator<Item = ByteRegion> + '_ {
        self.free_by_offset
            .iter()
            .map(|(&offset, &size)| ByteRegion::new(offset, size))
    }

    /// The total number of free bytes below the end of the store.
    #[must_use]
    pub fn free_bytes(&self) -> u64 {
        self.free_by_offset.values().sum()
    }

    /// Allocate a region of `size` bytes.
    ///
    /// # Errors
    /// Returns [`StorageError::Allocation`] if no free region fits and the store cannot grow by `size` bytes.
    pub fn allocate(&mut self, size: u64) -> Result<ByteRegion, StorageError> {
        if size == 0 {
            return Ok(ByteRegion::new(0, 0));
        }

        let best_fit = self
            .size_classes
            .range(size_class(size)..)
            .find_map(|(_, regions)| regions.range((size, 0)..).next().copied());
        if let Some((free_size, offset)) = best_fit {
            self.remove_free(offset, free_size);
            if free_size > size {
                self.insert_free(offset + size, free_size - size);
            }
            log::trace!("allocated {size} bytes at {offset} from a free region of {free_size} bytes");
            return Ok(ByteRegion::new(offset, size));
        }

        let offset = self.end_of_store;
        if let Some(capacity) = self.capacity
            && offset + size > capacity
        {
            return Err(StorageError::Allocation {
                requested: size,
                available: capacity.saturating_sub(offset),
            });
        }
        self.end_of_store += size;
        log::trace!("allocated {size} bytes at the end of the store ({offset})");
        Ok(ByteRegion::new(offset, size))
    }

    /// Release a previously allocated region.
    ///
    /// # Errors
    /// Returns [`StorageError::Other`] if the region overlaps a free region or the end of the store.
    pub fn release(&mut self, region: ByteRegion) -> Result<(), StorageError> {
        if region.is_empty() {
            return Ok(());
        }
        if region.end() > self.end_of_store || self.overlaps_free(region) {
            return Err(StorageError::Other(format!(
                "cannot release {region}, it is not an allocated region"
            )));
        }

        let mut merged = region;
        if let Some((&offset, &size)) = self.free_by_offset.range(..region.offset).next_back()
            && offset + size == region.offset
        {
            self.remove_free(offset, size);
            merged = ByteRegion::new(offset, size + merged.size);
        }
        if let Some(&size) = self.free_by_offset.get(&region.end()) {
            self.remove_free(region.end(), size);
            merged.size += size;
        }

        if merged.end() == self.end_of_store {
            log::debug!(
                "released {region}, store shrinks from {} to {}",
                self.end_of_store,
                merged.offset
            );
            self.end_of_store = merged.offset;
        } else {
            log::debug!("released {region} into free region {merged}");
            self.insert_free(merged.offset, merged.size);
        }
        Ok(())
    }

    fn overlaps_free(&self, region: ByteRegion) -> bool {
        let before = self
            .free_by_offset
            .range(..region.end())
            .next_back()
            .map(|(&offset, &size)| ByteRegion::new(offset, size));
        before.is_some_and(|free| free.overlaps(&region))
    }

    fn insert_free(&mut self, offset: u64, size: u64) {
        self.free_by_offset.insert(offset, size);
        self.size_classes
            .entry(size_class(size))
            .or_default()
            .insert((size, offset));
    }

    fn remove_free(&mut self, offset: u64, size: u64) {
        self.free_by_offset.remove(&offset);
        let class = size_class(size);
        if let Some(regions) = self.size_classes.get_mut(&class) {
            regions.remove(&(size, offset));
            if regions.is_empty() {
                self.size_classes.remove(&class);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_space_size_class() {
        assert_eq!(size_class(1), 0);
        assert_eq!(size_class(2), 1);
        assert_eq!(size_class(3), 1);
        assert_eq!(size_class(4096), 12);
        assert_eq!(size_class(4097), 12);
    }

    #[test]
    fn free_space_append_and_reuse() -> Result<(), StorageError> {
        let mut manager = FreeSpaceManager::new(None);
        let a = manager.allocate(100)?;
        let b = manager.allocate(50)?;
        let c = manager.allocate(200)?;
        assert_eq!(a, ByteRegion::new(0, 100));
        assert_eq!(b, ByteRegion::new(100, 50));
        assert_eq!(c, ByteRegion::new(150, 200));
        assert_eq!(manager.end_of_store(), 350);

        manager.release(a)?;
        assert_eq!(manager.free_bytes(), 100);
        let d = manager.allocate(60)?;
        assert_eq!(d, ByteRegion::new(0, 60));
        assert_eq!(manager.free_regions().collect::<Vec<_>>(), vec![ByteRegion::new(60, 40)]);
        assert_eq!(manager.end_of_store(), 350);
        Ok(())
    }

    #[test]
    fn free_space_best_fit() -> Result<(), StorageError> {
        let mut manager = FreeSpaceManager::new(None);
        let regions = [10, 1, 7, 1, 8, 1]
            .into_iter()
            .map(|size| manager.allocate(size))
            .collect::<Result<Vec<_>, _>>()?;
        manager.release(regions[0])?;
        manager.release(regions[2])?;
        manager.release(regions[4])?;
        // 7 is the tightest fit for 6, 8 is tightest for 8
        assert_eq!(manager.allocate(6)?, ByteRegion::new(regions[2].offset, 6));
        assert_eq!(manager.allocate(8)?, regions[4]);
        assert_eq!(manager.allocate(9)?, ByteRegion::new(regions[0].offset, 9));
        Ok(())
    }

    #[test]
    fn free_space_coalesce() -> Result<(), StorageError> {
        let mut manager = FreeSpaceManager::new(None);
        let a = manager.allocate(10)?;
        let b = manager.allocate(10)?;
        let c = manager.allocate(10)?;
        let _d = manager.allocate(10)?;
        manager.release(a)?;
        manager.release(c)?;
        assert_eq!(manager.free_regions().count(), 2);
        manager.release(b)?;
        assert_eq!(
            manager.free_regions().collect::<Vec<_>>(),
            vec![ByteRegion::new(0, 30)]
        );
        assert_eq!(manager.allocate(25)?, ByteRegion::new(0, 25));
        Ok(())
    }

    #[test]
    fn free_space_tail_shrinks() -> Result<(), StorageError> {
        let mut manager = FreeSpaceManager::new(None);
        let a = manager.allocate(10)?;
        let b = manager.allocate(10)?;
        let c = manager.allocate(10)?;
        manager.release(b)?;
        manager.release(c)?;
        assert_eq!(manager.end_of_store(), 10);
        assert_eq!(manager.free_regions().count(), 0);
        manager.release(a)?;
        assert_eq!(manager.end_of_store(), 0);
        Ok(())
    }

    #[test]
    fn free_space_invalid_release() -> Result<(), StorageError> {
        let mut manager = FreeSpaceManager::new(None);
        let a = manager.allocate(10)?;
        let _b = manager.allocate(10)?;
        manager.release(a)?;
        assert!(manager.release(a).is_err());
        assert!(manager.release(ByteRegion::new(5, 10)).is_err());
        assert!(manager.release(ByteRegion::new(15, 10)).is_err());
        Ok(())
    }

    #[test]
    fn free_space_capacity() -> Result<(), StorageError> {
        let mut manager = FreeSpaceManager::new(Some(64));
        let a = manager.allocate(40)?;
        let _b = manager.allocate(20)?;
        assert!(matches!(
            manager.allocate(8),
            Err(StorageError::Allocation {
                requested: 8,
                available: 4
            })
        ));
        manager.release(a)?;
        assert_eq!(manager.allocate(8)?, ByteRegion::new(0, 8));
        Ok(())
    }

    #[test]
    fn free_space_metadata() -> Result<(), StorageError> {
        let mut manager = FreeSpaceManager::new(None);
        let regions = (0..6)
            .map(|_| manager.allocate(16))
            .collect::<Result<Vec<_>, _>>()?;
        manager.release(regions[1])?;
        manager.release(regions[3])?;
        let metadata = manager.metadata();
        assert_eq!(metadata.end_of_store, 96);
        assert_eq!(metadata.free_regions.len(), 2);

        let restored = FreeSpaceManager::from_metadata(&metadata, None)?;
        assert_eq!(restored.metadata(), metadata);

        let invalid = FreeSpaceMetadata {
            end_of_store: 32,
            free_regions: vec![ByteRegion::new(0, 16), ByteRegion::new(8, 16)],
        };
        assert!(FreeSpaceManager::from_metadata(&invalid, None).is_err());
        Ok(())
    }
}
