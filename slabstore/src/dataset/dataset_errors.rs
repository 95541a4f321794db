use thiserror::Error;

use slabstore_codec::{CodecCreateError, CodecError};
use slabstore_dataspace::{
    ArrayShape, DataspaceError, IncompatibleDimensionalityError, MaxExtent, SelectionError,
};
use slabstore_storage::StorageError;

use super::{DataType, StorageLayout, data_type::UnsupportedDataTypeError};

/// A dataset creation error.
#[derive(Clone, Debug, Error)]
pub enum DatasetCreateError {
    /// The shape and maximum shape are inconsistent.
    #[error(transparent)]
    Dataspace(#[from] DataspaceError),
    /// Invalid chunk shape (contains zero).
    #[error("invalid chunk shape {0:?}: all elements must be non-zero")]
    InvalidChunkShape(ArrayShape),
    /// The dimensionality of the chunk shape does not match the shape.
    #[error("chunk shape dimensionality {0} does not match dataset dimensionality {1}")]
    InvalidChunkShapeDimensionality(usize, usize),
    /// A chunk dimension exceeds its maximum extent.
    #[error("chunk dimension {dim} of size {size} exceeds its maximum extent {max}")]
    ChunkExceedsMaxExtent {
        /// The dimension.
        dim: usize,
        /// The chunk size.
        size: u64,
        /// The maximum extent.
        max: MaxExtent,
    },
    /// Unsupported data type.
    #[error(transparent)]
    UnsupportedDataType(#[from] UnsupportedDataTypeError),
    /// The fill value does not match the data type.
    #[error("fill value of {len} bytes is incompatible with data type {data_type}")]
    InvalidFillValue {
        /// The data type.
        data_type: DataType,
        /// The length of the fill value in bytes.
        len: usize,
    },
    /// Error creating codecs.
    #[error(transparent)]
    CodecCreateError(#[from] CodecCreateError),
    /// The layout does not accept codecs.
    #[error("the {0} layout does not accept codecs")]
    LayoutCodecs(StorageLayout),
    /// The layout does not accept a maximum extent larger than the shape.
    #[error("the {0} layout cannot be resized")]
    LayoutNotGrowable(StorageLayout),
    /// The chunk shape of an unchunked layout differs from the shape.
    #[error("the {layout} layout requires a chunk shape of {expected:?}, got {chunk_shape:?}")]
    LayoutChunkShape {
        /// The layout.
        layout: StorageLayout,
        /// The chunk shape.
        chunk_shape: ArrayShape,
        /// The required chunk shape.
        expected: ArrayShape,
    },
    /// A compact dataset is too large.
    #[error("compact dataset of {size} bytes exceeds the limit of {limit} bytes")]
    CompactTooLarge {
        /// The size of the dataset in bytes.
        size: u64,
        /// The compact size limit.
        limit: u64,
    },
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// Error initialising the dataset storage.
    #[error(transparent)]
    DatasetError(#[from] DatasetError),
    /// Missing metadata.
    #[error("dataset metadata is missing")]
    MissingMetadata,
    /// Invalid metadata.
    #[error("invalid dataset metadata: {0}")]
    InvalidMetadata(String),
    /// Unsupported metadata version.
    #[error("unsupported dataset metadata version {0}")]
    UnsupportedVersion(u32),
}

/// Dataset errors.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum DatasetError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A codec error.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// A selection error.
    #[error(transparent)]
    SelectionError(#[from] SelectionError),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionalityError(#[from] IncompatibleDimensionalityError),
    /// A resized dimension exceeds its maximum extent.
    #[error("cannot resize dimension {dim} to {size}, the maximum extent is {max}")]
    ResizeOutOfBounds {
        /// The dimension.
        dim: usize,
        /// The requested size.
        size: u64,
        /// The maximum extent.
        max: MaxExtent,
    },
    /// A resized dimension would shrink.
    #[error("cannot shrink dimension {dim} from {current} to {size}")]
    ResizeShrink {
        /// The dimension.
        dim: usize,
        /// The requested size.
        size: u64,
        /// The current size.
        current: u64,
    },
    /// The buffer length does not match the selection.
    #[error("got a buffer of {len} bytes, expected {expected}")]
    SizeMismatch {
        /// The buffer length in bytes.
        len: usize,
        /// The expected length in bytes.
        expected: u64,
    },
    /// The element type is incompatible with the data type.
    #[error("the element type is incompatible with data type {0}")]
    IncompatibleElementType(DataType),
    /// A chunk is outside of the chunk grid.
    #[error("chunk {0:?} is outside of the chunk grid {1:?}")]
    InvalidChunkIndices(Vec<u64>, ArrayShape),
}

impl DatasetError {
    /// Returns true if the error is a checksum mismatch on decode.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CodecError(err) if err.is_corruption())
    }
}

impl From<DataspaceError> for DatasetError {
    fn from(err: DataspaceError) -> Self {
        match err {
            DataspaceError::IncompatibleDimensionality(err) => err.into(),
            DataspaceError::ExceedsMaxExtent { dim, size, max } => {
                Self::ResizeOutOfBounds { dim, size, max }
            }
            DataspaceError::Shrink { dim, size, current } => {
                Self::ResizeShrink { dim, size, current }
            }
        }
    }
}
