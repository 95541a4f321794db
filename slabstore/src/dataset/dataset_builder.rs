use std::{num::NonZeroU64, sync::Arc};

use slabstore_codec::{BytesToBytesCodecTraits, CodecMetadata};
use slabstore_dataspace::{ArrayShape, ChunkShape, MaxExtent};
use slabstore_storage::StorageBackend;

use super::{
    AllocationTime, DataType, Dataset, DatasetConfig, DatasetCreateError, Element, FillValue,
    NumericKind, StorageLayout, dataset_config::unchunked_shape,
};

/// The target size of a chunk picked when no chunk shape is given.
const CHUNK_SIZE_TARGET: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
enum DatasetBuilderFillValue {
    Element { kind: NumericKind, bytes: Vec<u8> },
    Bytes(FillValue),
}

/// A [`Dataset`] builder.
///
/// The only mandatory parameters are the shape and data type.
/// The defaults are:
///  - a maximum shape equal to the shape,
///  - a zero fill value,
///  - no codecs,
///  - [`AllocationTime::Late`], and
///  - the [`StorageLayout::Chunked`] layout if a chunk shape or codecs are given or the dataset is growable, otherwise [`StorageLayout::Contiguous`].
///
/// If the layout is chunked and no chunk shape is given, one is picked by halving the shape until a chunk is no larger than 1 MiB.
///
/// ```rust
/// # use std::sync::Arc;
/// use slabstore::dataset::{AllocationTime, DataType, DatasetBuilder, StorageLayout};
/// use slabstore::codec::bytes_to_bytes::fletcher32::Fletcher32Codec;
/// # let backend = Arc::new(slabstore::storage::backend::MemoryBackend::new());
/// let dataset = DatasetBuilder::new(vec![100, 100], DataType::FLOAT32)
///     .chunk_shape(vec![10, 10])
///     .codecs(vec![Arc::new(Fletcher32Codec::new())])
///     .allocation_time(AllocationTime::Early)
///     .build(backend)?;
/// assert_eq!(dataset.layout(), StorageLayout::Chunked);
/// assert_eq!(dataset.codecs(), vec!["fletcher32"]);
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    shape: ArrayShape,
    data_type: DataType,
    max_shape: Option<Vec<MaxExtent>>,
    chunk_shape: Option<ArrayShape>,
    fill_value: Option<DatasetBuilderFillValue>,
    codecs: Vec<CodecMetadata>,
    allocation_time: AllocationTime,
    layout: Option<StorageLayout>,
}

impl DatasetBuilder {
    /// Create a new dataset builder for a dataset of `shape` and `data_type`.
    #[must_use]
    pub fn new(shape: ArrayShape, data_type: DataType) -> Self {
        Self {
            shape,
            data_type,
            max_shape: None,
            chunk_shape: None,
            fill_value: None,
            codecs: Vec::new(),
            allocation_time: AllocationTime::default(),
            layout: None,
        }
    }

    /// Set the maximum shape.
    pub fn max_shape(&mut self, max_shape: Vec<MaxExtent>) -> &mut Self {
        self.max_shape = Some(max_shape);
        self
    }

    /// Set the chunk shape.
    pub fn chunk_shape(&mut self, chunk_shape: ArrayShape) -> &mut Self {
        self.chunk_shape = Some(chunk_shape);
        self
    }

    /// Set the fill value from an element.
    pub fn fill_value<T: Element>(&mut self, fill_value: T) -> &mut Self {
        self.fill_value = Some(DatasetBuilderFillValue::Element {
            kind: T::KIND,
            bytes: bytemuck::bytes_of(&fill_value).to_vec(),
        });
        self
    }

    /// Set the fill value from bytes in the byte order of the data type.
    pub fn fill_value_bytes(&mut self, fill_value: FillValue) -> &mut Self {
        self.fill_value = Some(DatasetBuilderFillValue::Bytes(fill_value));
        self
    }

    /// Set the codecs, in encode order.
    pub fn codecs(&mut self, codecs: Vec<Arc<dyn BytesToBytesCodecTraits>>) -> &mut Self {
        self.codecs = codecs.iter().map(|codec| codec.create_metadata()).collect();
        self
    }

    /// Set the codecs from their metadata, in encode order.
    pub fn codec_metadata(&mut self, codecs: Vec<CodecMetadata>) -> &mut Self {
        self.codecs = codecs;
        self
    }

    /// Set the allocation time.
    pub fn allocation_time(&mut self, allocation_time: AllocationTime) -> &mut Self {
        self.allocation_time = allocation_time;
        self
    }

    /// Set the storage layout.
    pub fn layout(&mut self, layout: StorageLayout) -> &mut Self {
        self.layout = Some(layout);
        self
    }

    /// Create the validated dataset configuration.
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if any parameter is invalid.
    pub fn config(&self) -> Result<DatasetConfig, DatasetCreateError> {
        let max_shape = self.max_shape.clone().unwrap_or_else(|| {
            self.shape
                .iter()
                .copied()
                .map(MaxExtent::Bounded)
                .collect()
        });
        let growable = std::iter::zip(&self.shape, &max_shape)
            .any(|(&size, max)| *max != MaxExtent::Bounded(size));

        let layout = self.layout.unwrap_or(
            if self.chunk_shape.is_some() || !self.codecs.is_empty() || growable {
                StorageLayout::Chunked
            } else {
                StorageLayout::Contiguous
            },
        );

        let chunk_shape = match (&self.chunk_shape, layout) {
            (Some(chunk_shape), _) => chunk_shape.clone(),
            (None, StorageLayout::Chunked) => guess_chunk_shape(&self.shape, self.data_type.size()),
            (None, StorageLayout::Compact | StorageLayout::Contiguous) => {
                unchunked_shape(&self.shape)
            }
        };
        let chunk_shape: ChunkShape = chunk_shape
            .iter()
            .map(|&size| NonZeroU64::new(size))
            .collect::<Option<_>>()
            .ok_or_else(|| DatasetCreateError::InvalidChunkShape(chunk_shape.clone()))?;

        let fill_value = match &self.fill_value {
            None => FillValue::zero(&self.data_type),
            Some(DatasetBuilderFillValue::Bytes(fill_value)) => fill_value.clone(),
            Some(DatasetBuilderFillValue::Element { kind, bytes }) => {
                if *kind != self.data_type.kind() || bytes.len() != self.data_type.size() {
                    return Err(DatasetCreateError::InvalidFillValue {
                        data_type: self.data_type,
                        len: bytes.len(),
                    });
                }
                let mut bytes = bytes.clone();
                if !self.data_type.endianness().is_native() {
                    bytes.reverse();
                }
                FillValue::new(bytes)
            }
        };

        let config = DatasetConfig {
            shape: self.shape.clone(),
            max_shape,
            chunk_shape,
            data_type: self.data_type,
            fill_value,
            codecs: self.codecs.clone(),
            allocation_time: self.allocation_time,
            layout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build into a [`Dataset`] stored in `backend`.
    ///
    /// Any existing content of `backend` is discarded.
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if any parameter is invalid or the dataset storage cannot be initialised.
    pub fn build<TBackend: ?Sized + StorageBackend>(
        &self,
        backend: Arc<TBackend>,
    ) -> Result<Dataset<TBackend>, DatasetCreateError> {
        Dataset::create(backend, self.config()?)
    }
}

/// Pick a chunk shape by halving dimensions in turn until a chunk is no larger than [`CHUNK_SIZE_TARGET`].
fn guess_chunk_shape(shape: &[u64], element_size: usize) -> ArrayShape {
    let mut chunk_shape = unchunked_shape(shape);
    let chunk_size =
        |chunk_shape: &[u64]| chunk_shape.iter().product::<u64>() * element_size as u64;
    let mut dim = 0;
    while chunk_size(&chunk_shape) > CHUNK_SIZE_TARGET && chunk_shape.iter().any(|&size| size > 1) {
        if chunk_shape[dim] > 1 {
            chunk_shape[dim] = chunk_shape[dim].div_ceil(2);
        }
        dim = (dim + 1) % chunk_shape.len();
    }
    chunk_shape
}
