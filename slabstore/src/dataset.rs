//! Datasets: chunked, compressed, resizable n-dimensional arrays.
//!
//! A [`Dataset`] composes a [`Dataspace`], a [`RegularChunkGrid`], a [`CodecChain`], and a [`ChunkStore`].
//! Create a dataset with a [`DatasetBuilder`] or reopen a persisted one with [`Dataset::open`].
//!
//! Reads and writes take a [`Selection`](slabstore_dataspace::Selection) of the current extent.
//! The selection is split into runs per chunk, and every touched chunk is decoded (or synthesised from the fill value), spliced, re-encoded, and stored.
//! A chunk is read and rewritten under its chunk lock, so concurrent writes to the same chunk serialise while writes to different chunks proceed independently.

mod data_type;
mod dataset_builder;
mod dataset_config;
mod dataset_errors;
mod dataset_metadata;
mod element;
mod fill_value;

mod dataset_sync_readable;
mod dataset_sync_writable;

use std::sync::Arc;

use parking_lot::RwLock;

use slabstore_codec::CodecChain;
use slabstore_dataspace::{ChunkShape, Dataspace, MaxExtent, RegularChunkGrid};
use slabstore_storage::{Bytes, ChunkStore, StorageBackend, StorageError};

pub use self::data_type::{DataType, Endianness, NumericKind, UnsupportedDataTypeError};
pub use self::dataset_builder::DatasetBuilder;
pub use self::dataset_config::{AllocationTime, DatasetConfig, StorageLayout};
pub use self::dataset_errors::{DatasetCreateError, DatasetError};
pub use self::element::Element;
pub use self::fill_value::FillValue;
use self::dataset_metadata::{CompactData, DATASET_METADATA_VERSION, DatasetMetadata};

/// The allocation status of the storage of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SpaceStatus {
    /// No chunk has been allocated.
    #[display("not allocated")]
    NotAllocated,
    /// Some chunks have been allocated.
    #[display("partly allocated")]
    PartlyAllocated,
    /// Every chunk of the current extent has been allocated.
    #[display("allocated")]
    Allocated,
}

/// A dataset.
///
/// A dataset is an n-dimensional array of fixed-size numeric elements held in a [`StorageBackend`].
///
/// The dataset metadata is persisted to the backend when the dataset is created, on [`flush`](Dataset::flush), and on [`close`](Dataset::close).
/// Dropping a dataset without closing it performs a best-effort flush.
#[derive(Debug)]
pub struct Dataset<TBackend: ?Sized + StorageBackend> {
    config: DatasetConfig,
    dataspace: Dataspace,
    chunk_grid: RegularChunkGrid,
    codec_chain: CodecChain,
    chunk_store: ChunkStore<TBackend>,
    compact: Option<RwLock<Vec<u8>>>,
    closed: bool,
}

impl<TBackend: ?Sized + StorageBackend> Dataset<TBackend> {
    /// Create a dataset in `backend` from a configuration.
    ///
    /// Any existing content of `backend` is discarded.
    /// With [`AllocationTime::Early`] every chunk is allocated and written with the fill value.
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if the configuration is invalid or the storage cannot be initialised.
    pub fn create(backend: Arc<TBackend>, config: DatasetConfig) -> Result<Self, DatasetCreateError> {
        let (dataspace, codec_chain) = config.create_components()?;
        let chunk_store = ChunkStore::new(backend)?;
        let compact = (config.layout == StorageLayout::Compact).then(|| {
            RwLock::new(config.fill_value.repeat(element_count(dataspace.num_elements())))
        });
        let dataset = Self {
            chunk_grid: RegularChunkGrid::new(config.chunk_shape.clone()),
            config,
            dataspace,
            codec_chain,
            chunk_store,
            compact,
            closed: false,
        };
        if dataset.config.allocation_time == AllocationTime::Early {
            dataset.allocate_chunks()?;
        }
        dataset.flush()?;
        log::debug!(
            "created {} dataset {:?} of {}",
            dataset.config.layout,
            dataset.shape(),
            dataset.config.data_type
        );
        Ok(dataset)
    }

    /// Open a dataset persisted in `backend`.
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if the metadata is missing or invalid, or there is an underlying storage error.
    pub fn open(backend: Arc<TBackend>) -> Result<Self, DatasetCreateError> {
        let metadata = backend
            .get_metadata()?
            .ok_or(DatasetCreateError::MissingMetadata)?;
        let metadata: DatasetMetadata = serde_json::from_slice(&metadata)
            .map_err(|err| DatasetCreateError::InvalidMetadata(err.to_string()))?;
        if metadata.version != DATASET_METADATA_VERSION {
            return Err(DatasetCreateError::UnsupportedVersion(metadata.version));
        }
        let DatasetMetadata {
            config,
            chunk_store,
            compact,
            ..
        } = metadata;

        let (dataspace, codec_chain) = config.create_components()?;
        let compact = match (config.layout, compact) {
            (StorageLayout::Compact, Some(CompactData(data))) => {
                if data.len() as u64 != config.size_bytes() {
                    return Err(DatasetCreateError::InvalidMetadata(format!(
                        "compact data is {} bytes, expected {}",
                        data.len(),
                        config.size_bytes()
                    )));
                }
                Some(RwLock::new(data))
            }
            (StorageLayout::Compact, None) => {
                return Err(DatasetCreateError::InvalidMetadata(
                    "compact data is missing".to_string(),
                ));
            }
            (_, _) => None,
        };
        let chunk_store = ChunkStore::from_metadata(backend, chunk_store)?;
        log::debug!(
            "opened {} dataset {:?} with {} allocated chunks",
            config.layout,
            config.shape,
            chunk_store.num_allocated()
        );
        Ok(Self {
            chunk_grid: RegularChunkGrid::new(config.chunk_shape.clone()),
            config,
            dataspace,
            codec_chain,
            chunk_store,
            compact,
            closed: false,
        })
    }

    /// Persist the dataset metadata and flush the backend.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if there is an underlying storage error.
    pub fn flush(&self) -> Result<(), DatasetError> {
        let metadata = DatasetMetadata {
            version: DATASET_METADATA_VERSION,
            config: self.config.clone(),
            chunk_store: self.chunk_store.metadata(),
            compact: self
                .compact
                .as_ref()
                .map(|compact| CompactData(compact.read().clone())),
        };
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|err| StorageError::InvalidMetadata(err.to_string()))?;
        self.chunk_store.flush()?;
        self.chunk_store.backend().set_metadata(Bytes::from(json))?;
        log::debug!("flushed dataset {:?}", self.shape());
        Ok(())
    }

    /// Flush and close the dataset.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if there is an underlying storage error.
    pub fn close(mut self) -> Result<(), DatasetError> {
        self.flush()?;
        self.closed = true;
        Ok(())
    }

    /// Get the current shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.dataspace.shape()
    }

    /// Get the maximum shape.
    #[must_use]
    pub fn max_shape(&self) -> &[MaxExtent] {
        self.dataspace.max_shape()
    }

    /// Get the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &ChunkShape {
        &self.config.chunk_shape
    }

    /// Get the data type.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        &self.config.data_type
    }

    /// Get the fill value.
    #[must_use]
    pub fn fill_value(&self) -> &FillValue {
        &self.config.fill_value
    }

    /// Get the storage layout.
    #[must_use]
    pub fn layout(&self) -> StorageLayout {
        self.config.layout
    }

    /// Get the allocation time.
    #[must_use]
    pub fn allocation_time(&self) -> AllocationTime {
        self.config.allocation_time
    }

    /// Get the codec names, in encode order.
    #[must_use]
    pub fn codecs(&self) -> Vec<String> {
        self.codec_chain.names()
    }

    /// Get the codec chain.
    #[must_use]
    pub fn codec_chain(&self) -> &CodecChain {
        &self.codec_chain
    }

    /// Get the dataspace.
    #[must_use]
    pub fn dataspace(&self) -> &Dataspace {
        &self.dataspace
    }

    /// Get the chunk grid.
    #[must_use]
    pub fn chunk_grid(&self) -> &RegularChunkGrid {
        &self.chunk_grid
    }

    /// Get the chunk store.
    #[must_use]
    pub fn chunk_store(&self) -> &ChunkStore<TBackend> {
        &self.chunk_store
    }

    /// Get the configuration, with the current shape.
    #[must_use]
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Return the number of bytes used to store the dataset.
    ///
    /// This is the size of the inline data of a compact dataset, otherwise the total size of the stored (encoded) chunks.
    #[must_use]
    pub fn storage_size(&self) -> u64 {
        match &self.compact {
            Some(compact) => compact.read().len() as u64,
            None => self.chunk_store.stored_bytes(),
        }
    }

    /// Return the allocation status of the dataset storage.
    #[must_use]
    pub fn space_status(&self) -> SpaceStatus {
        if self.compact.is_some() {
            return SpaceStatus::Allocated;
        }
        let num_chunks: u64 = self
            .chunk_grid
            .grid_shape(self.shape())
            .map_or(0, |grid_shape| grid_shape.iter().product());
        let num_allocated = self.chunk_store.num_allocated() as u64;
        if num_allocated == 0 && num_chunks > 0 {
            SpaceStatus::NotAllocated
        } else if num_allocated >= num_chunks {
            SpaceStatus::Allocated
        } else {
            SpaceStatus::PartlyAllocated
        }
    }

    /// The size of a decoded chunk in bytes.
    fn chunk_size_bytes(&self) -> usize {
        element_count(self.chunk_grid.chunk_num_elements()) * self.config.data_type.size()
    }
}

impl<TBackend: ?Sized + StorageBackend> Drop for Dataset<TBackend> {
    fn drop(&mut self) {
        if !self.closed
            && let Err(err) = self.flush()
        {
            log::error!("failed to flush dataset {:?} on drop: {err}", self.shape());
        }
    }
}

/// Convert an element count of an in-memory buffer to [`usize`].
#[allow(clippy::cast_possible_truncation)]
const fn element_count(num_elements: u64) -> usize {
    num_elements as usize
}
