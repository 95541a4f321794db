use std::borrow::Cow;

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use slabstore_codec::CodecOptions;
use slabstore_dataspace::{ChunkRun, Selection, map_to_chunks, ravel_indices};
use slabstore_storage::{ChunkEncoding, StorageBackend};

use super::{
    AllocationTime, Dataset, DatasetError, Element, dataset_sync_readable::byte_range,
    element_count,
};
use crate::config::global_config;

impl<TBackend: ?Sized + StorageBackend> Dataset<TBackend> {
    /// Write `buffer` to the elements of `selection`, in C order of the selection.
    ///
    /// Each touched chunk is decoded (or synthesised from the fill value), spliced, encoded, and stored while holding its chunk lock.
    /// A chunk that is entirely covered by the selection is not decoded.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if
    ///  - the selection lies outside the current extent,
    ///  - the length of `buffer` does not match the number of selected elements,
    ///  - a chunk fails to decode or encode, or
    ///  - there is an underlying storage error, such as the backing store being unable to grow.
    ///
    /// A chunk that fails to store keeps its previous content.
    pub fn write(&self, selection: &Selection, buffer: &[u8]) -> Result<(), DatasetError> {
        self.validate_selection(selection, buffer.len())?;
        let element_size = self.config.data_type.size();

        if let Some(compact) = &self.compact {
            let mut compact = compact.write();
            let mut position = 0;
            for run in selection.runs() {
                let offset = ravel_indices(&run.start, self.shape());
                let target = byte_range(offset, run.len, element_size);
                let len = target.len();
                compact[target].copy_from_slice(&buffer[position..position + len]);
                position += len;
            }
            return Ok(());
        }

        let mapping = map_to_chunks(selection.runs(), &self.chunk_grid)?;
        log::trace!(
            "writing {} elements to {} chunks",
            mapping.num_elements(),
            mapping.len()
        );
        if mapping.len() > global_config().chunk_concurrent_minimum() {
            mapping
                .iter()
                .collect::<Vec<_>>()
                .into_par_iter()
                .try_for_each(|(chunk_indices, runs)| {
                    self.write_chunk_runs(chunk_indices, runs, buffer)
                })
        } else {
            mapping
                .iter()
                .try_for_each(|(chunk_indices, runs)| {
                    self.write_chunk_runs(chunk_indices, runs, buffer)
                })
        }
    }

    /// Write `elements` to the elements of `selection`.
    ///
    /// # Errors
    /// Returns [`DatasetError::IncompatibleElementType`] if `T` does not match the data type, or an error from [`write`](Dataset::write).
    pub fn write_elements<T: Element>(
        &self,
        selection: &Selection,
        elements: &[T],
    ) -> Result<(), DatasetError> {
        let buffer = T::to_bytes(&self.config.data_type, elements)?;
        self.write(selection, &buffer)
    }

    /// Write the selected positions of `buffer`, a buffer covering the whole current extent.
    ///
    /// # Errors
    /// Returns [`DatasetError::SizeMismatch`] if `buffer` does not cover the current extent, or an error from [`write`](Dataset::write).
    pub fn write_masked(&self, selection: &Selection, buffer: &[u8]) -> Result<(), DatasetError> {
        self.validate_extent_buffer(buffer.len())?;
        let element_size = self.config.data_type.size();
        let mut selected = Vec::with_capacity(element_count(selection.num_elements()) * element_size);
        for run in selection.runs() {
            let offset = ravel_indices(&run.start, self.shape());
            selected.extend_from_slice(&buffer[byte_range(offset, run.len, element_size)]);
        }
        self.write(selection, &selected)
    }

    /// Write the selected positions of `elements`, a buffer covering the whole current extent.
    ///
    /// # Errors
    /// See [`write_masked`](Dataset::write_masked).
    pub fn write_masked_elements<T: Element>(
        &self,
        selection: &Selection,
        elements: &[T],
    ) -> Result<(), DatasetError> {
        let buffer = T::to_bytes(&self.config.data_type, elements)?;
        self.write_masked(selection, &buffer)
    }

    /// Encode and store a decoded chunk at `chunk_indices`, replacing any existing chunk.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if `chunk_bytes` is not the size of a chunk, encoding fails, or there is an underlying storage error.
    pub fn store_chunk(&self, chunk_indices: &[u64], chunk_bytes: &[u8]) -> Result<(), DatasetError> {
        let expected = self.chunk_size_bytes();
        if chunk_bytes.len() != expected {
            return Err(DatasetError::SizeMismatch {
                len: chunk_bytes.len(),
                expected: expected as u64,
            });
        }
        self.validate_chunk_indices(chunk_indices)?;
        if let Some(compact) = &self.compact {
            compact.write().copy_from_slice(chunk_bytes);
            return Ok(());
        }

        let chunk_lock = self.chunk_store.chunk_lock(chunk_indices);
        let _guard = chunk_lock.write();
        self.encode_chunk(chunk_indices, chunk_bytes)
    }

    /// Change the current extent to `shape`.
    ///
    /// Already stored chunks are untouched, and newly reachable elements read as the fill value until written.
    /// With [`AllocationTime::Early`] newly reachable chunks are allocated and written with the fill value.
    ///
    /// # Errors
    /// Returns
    ///  - [`DatasetError::ResizeOutOfBounds`] if a dimension exceeds its maximum extent,
    ///  - [`DatasetError::ResizeShrink`] if a dimension would shrink,
    ///  - [`DatasetError::IncompatibleDimensionalityError`] if the dimensionality of `shape` does not match, or
    ///  - a [`DatasetError`] if early allocation fails.
    pub fn resize(&mut self, shape: &[u64]) -> Result<(), DatasetError> {
        let previous = self.shape().to_vec();
        self.dataspace.resize(shape)?;
        self.config.shape = shape.to_vec();
        if self.config.allocation_time == AllocationTime::Early {
            self.allocate_chunks()?;
        }
        log::debug!("resized dataset from {previous:?} to {shape:?}");
        Ok(())
    }

    /// Allocate and write every unallocated chunk of the current extent with the fill value.
    ///
    /// Returns the number of chunks allocated.
    pub(super) fn allocate_chunks(&self) -> Result<usize, DatasetError> {
        if self.compact.is_some() {
            return Ok(0);
        }
        let fill_chunk = self
            .config
            .fill_value
            .repeat(element_count(self.chunk_grid.chunk_num_elements()));
        let encoded = self
            .codec_chain
            .encode(Cow::Borrowed(&fill_chunk[..]), &CodecOptions::default())?;
        let encoding = ChunkEncoding {
            decoded_size: fill_chunk.len() as u64,
            codecs: self.codec_chain.names(),
        };

        let mut num_allocated = 0;
        for chunk_indices in self.chunk_grid.chunks(self.shape())? {
            if !self.chunk_store.is_allocated(&chunk_indices) {
                let handle = self
                    .chunk_store
                    .get_or_allocate(&chunk_indices, encoded.len() as u64)?;
                self.chunk_store.write(&handle, &encoded, encoding.clone())?;
                num_allocated += 1;
            }
        }
        log::debug!("allocated {num_allocated} chunks early");
        Ok(num_allocated)
    }

    /// Splice the elements of `runs` from `buffer` into the chunk at `chunk_indices`.
    fn write_chunk_runs(
        &self,
        chunk_indices: &[u64],
        runs: &[ChunkRun],
        buffer: &[u8],
    ) -> Result<(), DatasetError> {
        let element_size = self.config.data_type.size();
        let chunk_lock = self.chunk_store.chunk_lock(chunk_indices);
        let _guard = chunk_lock.write();

        let chunk_bytes = match runs {
            [run] if run.chunk_offset == 0 && run.len == self.chunk_grid.chunk_num_elements() => {
                Cow::Borrowed(&buffer[byte_range(run.selection_offset, run.len, element_size)])
            }
            _ => {
                let mut chunk_bytes = self.decode_chunk(chunk_indices)?;
                for run in runs {
                    let source = byte_range(run.selection_offset, run.len, element_size);
                    let target = byte_range(run.chunk_offset, run.len, element_size);
                    chunk_bytes[target].copy_from_slice(&buffer[source]);
                }
                Cow::Owned(chunk_bytes)
            }
        };
        self.encode_chunk(chunk_indices, &chunk_bytes)
    }

    /// Encode and store a chunk. The caller must hold the chunk lock for writing.
    fn encode_chunk(&self, chunk_indices: &[u64], chunk_bytes: &[u8]) -> Result<(), DatasetError> {
        let encoded = self
            .codec_chain
            .encode(Cow::Borrowed(chunk_bytes), &CodecOptions::default())?;
        let handle = self
            .chunk_store
            .get_or_allocate(chunk_indices, encoded.len() as u64)?;
        self.chunk_store.write(
            &handle,
            &encoded,
            ChunkEncoding {
                decoded_size: chunk_bytes.len() as u64,
                codecs: self.codec_chain.names(),
            },
        )?;
        log::trace!(
            "stored chunk {chunk_indices:?} as {} bytes",
            encoded.len()
        );
        Ok(())
    }
}
