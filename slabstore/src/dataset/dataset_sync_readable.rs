use std::{borrow::Cow, ops::Range};

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use slabstore_codec::{BytesRepresentation, CodecError, CodecOptions};
use slabstore_dataspace::{
    ChunkRun, IncompatibleDimensionalityError, Selection, map_to_chunks, ravel_indices,
};
use slabstore_storage::{StorageBackend, StoredChunk};

use super::{Dataset, DatasetError, Element, element_count};
use crate::config::global_config;

impl<TBackend: ?Sized + StorageBackend> Dataset<TBackend> {
    /// Read the elements of `selection` into `buffer`, in C order of the selection.
    ///
    /// Elements that have never been written read as the fill value.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if
    ///  - the selection lies outside the current extent,
    ///  - the length of `buffer` does not match the number of selected elements,
    ///  - a chunk fails to decode (see [`DatasetError::is_corruption`]), or
    ///  - there is an underlying storage error.
    pub fn read(&self, selection: &Selection, buffer: &mut [u8]) -> Result<(), DatasetError> {
        self.validate_selection(selection, buffer.len())?;
        let element_size = self.config.data_type.size();

        if let Some(compact) = &self.compact {
            let compact = compact.read();
            let mut position = 0;
            for run in selection.runs() {
                let offset = ravel_indices(&run.start, self.shape());
                let source = byte_range(offset, run.len, element_size);
                buffer[position..position + source.len()].copy_from_slice(&compact[source.clone()]);
                position += source.len();
            }
            return Ok(());
        }

        let mapping = map_to_chunks(selection.runs(), &self.chunk_grid)?;
        log::trace!(
            "reading {} elements from {} chunks",
            mapping.num_elements(),
            mapping.len()
        );
        if mapping.len() > global_config().chunk_concurrent_minimum() {
            let chunks = mapping
                .iter()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|(chunk_indices, runs)| {
                    self.retrieve_chunk(chunk_indices)
                        .map(|chunk| (runs, chunk))
                })
                .collect::<Result<Vec<_>, DatasetError>>()?;
            for (runs, chunk) in chunks {
                copy_from_chunk(&chunk, runs, buffer, element_size);
            }
        } else {
            for (chunk_indices, runs) in &mapping {
                let chunk = self.retrieve_chunk(chunk_indices)?;
                copy_from_chunk(&chunk, runs, buffer, element_size);
            }
        }
        Ok(())
    }

    /// Read the elements of `selection` into a vector of elements.
    ///
    /// # Errors
    /// Returns [`DatasetError::IncompatibleElementType`] if `T` does not match the data type, or an error from [`read`](Dataset::read).
    pub fn read_elements<T: Element>(&self, selection: &Selection) -> Result<Vec<T>, DatasetError> {
        T::validate_data_type(&self.config.data_type)?;
        let mut buffer =
            vec![0; element_count(selection.num_elements()) * self.config.data_type.size()];
        self.read(selection, &mut buffer)?;
        T::from_bytes(&self.config.data_type, &buffer)
    }

    /// Read the elements of `selection` into `buffer`, a buffer covering the whole current extent.
    ///
    /// Only the selected positions of `buffer` are written.
    ///
    /// # Errors
    /// Returns [`DatasetError::SizeMismatch`] if `buffer` does not cover the current extent, or an error from [`read`](Dataset::read).
    pub fn read_masked(&self, selection: &Selection, buffer: &mut [u8]) -> Result<(), DatasetError> {
        self.validate_extent_buffer(buffer.len())?;
        let element_size = self.config.data_type.size();
        let mut selected = vec![0; element_count(selection.num_elements()) * element_size];
        self.read(selection, &mut selected)?;

        let mut position = 0;
        for run in selection.runs() {
            let offset = ravel_indices(&run.start, self.shape());
            let target = byte_range(offset, run.len, element_size);
            let len = target.len();
            buffer[target].copy_from_slice(&selected[position..position + len]);
            position += len;
        }
        Ok(())
    }

    /// Read the elements of `selection` into `elements`, a buffer covering the whole current extent.
    ///
    /// # Errors
    /// See [`read_masked`](Dataset::read_masked).
    pub fn read_masked_elements<T: Element>(
        &self,
        selection: &Selection,
        elements: &mut [T],
    ) -> Result<(), DatasetError> {
        let mut buffer = T::to_bytes(&self.config.data_type, elements)?.into_owned();
        self.read_masked(selection, &mut buffer)?;
        elements.copy_from_slice(&T::from_bytes(&self.config.data_type, &buffer)?);
        Ok(())
    }

    /// Read and decode the chunk at `chunk_indices`.
    ///
    /// A chunk that has never been written is returned as a repetition of the fill value.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if `chunk_indices` is outside the chunk grid, the chunk fails to decode, or there is an underlying storage error.
    pub fn retrieve_chunk(&self, chunk_indices: &[u64]) -> Result<Vec<u8>, DatasetError> {
        self.validate_chunk_indices(chunk_indices)?;
        if let Some(compact) = &self.compact {
            return Ok(compact.read().clone());
        }

        let chunk_lock = self.chunk_store.chunk_lock(chunk_indices);
        let _guard = chunk_lock.read();
        self.decode_chunk(chunk_indices)
    }

    /// Read and decode a chunk without taking its chunk lock.
    pub(super) fn decode_chunk(&self, chunk_indices: &[u64]) -> Result<Vec<u8>, DatasetError> {
        let chunk_size = self.chunk_size_bytes();
        let Some(StoredChunk { bytes, encoding }) = self.chunk_store.retrieve(chunk_indices)? else {
            return Ok(self.config.fill_value.repeat(element_count(
                self.chunk_grid.chunk_num_elements(),
            )));
        };

        let chain = self.codec_chain.names();
        if encoding.codecs != chain {
            return Err(CodecError::CodecMismatch {
                stored: encoding.codecs,
                chain,
            }
            .into());
        }
        if encoding.decoded_size != chunk_size as u64 {
            return Err(CodecError::UnexpectedDecodedSize {
                len: encoding.decoded_size,
                expected: chunk_size as u64,
            }
            .into());
        }

        let options =
            CodecOptions::default().with_validate_checksums(global_config().validate_checksums());
        let decoded = self.codec_chain.decode(
            Cow::Borrowed(&bytes[..]),
            &BytesRepresentation::FixedSize(chunk_size as u64),
            &options,
        )?;
        log::trace!(
            "decoded chunk {chunk_indices:?} from {} to {} bytes",
            bytes.len(),
            decoded.len()
        );
        Ok(decoded.into_owned())
    }

    /// Check `selection` against the current extent and the length of a selection buffer.
    pub(super) fn validate_selection(
        &self,
        selection: &Selection,
        len: usize,
    ) -> Result<(), DatasetError> {
        selection.validate(self.shape())?;
        let expected = selection.num_elements() * self.config.data_type.size() as u64;
        if len as u64 == expected {
            Ok(())
        } else {
            Err(DatasetError::SizeMismatch { len, expected })
        }
    }

    /// Check that `chunk_indices` lies within the chunk grid of the current extent.
    pub(super) fn validate_chunk_indices(&self, chunk_indices: &[u64]) -> Result<(), DatasetError> {
        let grid_shape = self.chunk_grid.grid_shape(self.shape())?;
        if chunk_indices.len() != grid_shape.len() {
            return Err(IncompatibleDimensionalityError::new(
                chunk_indices.len(),
                grid_shape.len(),
            )
            .into());
        }
        if std::iter::zip(chunk_indices, &grid_shape).any(|(index, size)| index >= size) {
            return Err(DatasetError::InvalidChunkIndices(
                chunk_indices.to_vec(),
                grid_shape,
            ));
        }
        Ok(())
    }

    /// Check the length of a buffer covering the whole current extent.
    pub(super) fn validate_extent_buffer(&self, len: usize) -> Result<(), DatasetError> {
        let expected = self.dataspace.num_elements() * self.config.data_type.size() as u64;
        if len as u64 == expected {
            Ok(())
        } else {
            Err(DatasetError::SizeMismatch { len, expected })
        }
    }
}

/// The byte range of `len` elements starting at element `offset`.
pub(super) fn byte_range(offset: u64, len: u64, element_size: usize) -> Range<usize> {
    let start = element_count(offset) * element_size;
    start..start + element_count(len) * element_size
}

fn copy_from_chunk(chunk: &[u8], runs: &[ChunkRun], buffer: &mut [u8], element_size: usize) {
    for run in runs {
        let source = byte_range(run.chunk_offset, run.len, element_size);
        let target = byte_range(run.selection_offset, run.len, element_size);
        buffer[target].copy_from_slice(&chunk[source]);
    }
}
