use serde::{Deserialize, Serialize};

use slabstore_codec::{CodecChain, CodecMetadata};
use slabstore_dataspace::{ArrayShape, ChunkShape, Dataspace, MaxExtent};

use super::{DataType, DatasetCreateError, FillValue};
use crate::config::global_config;

/// When chunk storage is allocated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum AllocationTime {
    /// Every chunk is allocated and written with the fill value when the dataset is created or grown.
    #[display("early")]
    Early,
    /// A chunk is allocated when it is first written.
    #[default]
    #[display("late")]
    Late,
}

/// The storage layout of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum StorageLayout {
    /// The data is held inline in the dataset metadata.
    #[display("compact")]
    Compact,
    /// The data is a single unencoded region.
    #[display("contiguous")]
    Contiguous,
    /// The data is split into chunks, each encoded independently.
    #[display("chunked")]
    Chunked,
}

/// The creation configuration of a dataset.
///
/// Created with a [`DatasetBuilder`](super::DatasetBuilder) and validated once when the dataset is created.
/// The `shape` tracks the current extent of the dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub(crate) shape: ArrayShape,
    pub(crate) max_shape: Vec<MaxExtent>,
    pub(crate) chunk_shape: ChunkShape,
    pub(crate) data_type: DataType,
    pub(crate) fill_value: FillValue,
    #[serde(default)]
    pub(crate) codecs: Vec<CodecMetadata>,
    #[serde(default)]
    pub(crate) allocation_time: AllocationTime,
    pub(crate) layout: StorageLayout,
}

impl DatasetConfig {
    /// The current shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The maximum shape.
    #[must_use]
    pub fn max_shape(&self) -> &[MaxExtent] {
        &self.max_shape
    }

    /// The chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &ChunkShape {
        &self.chunk_shape
    }

    /// The data type.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// The fill value.
    #[must_use]
    pub fn fill_value(&self) -> &FillValue {
        &self.fill_value
    }

    /// The codec metadata, in encode order.
    #[must_use]
    pub fn codecs(&self) -> &[CodecMetadata] {
        &self.codecs
    }

    /// The allocation time.
    #[must_use]
    pub fn allocation_time(&self) -> AllocationTime {
        self.allocation_time
    }

    /// The storage layout.
    #[must_use]
    pub fn layout(&self) -> StorageLayout {
        self.layout
    }

    /// The size of the dataset in bytes at its current shape.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.shape.iter().product::<u64>() * self.data_type.size() as u64
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if the configuration is invalid.
    pub fn validate(&self) -> Result<(), DatasetCreateError> {
        self.create_components().map(|_| ())
    }

    /// Validate the configuration and create the dataspace and codec chain.
    pub(crate) fn create_components(&self) -> Result<(Dataspace, CodecChain), DatasetCreateError> {
        self.data_type.validate()?;
        let dataspace = Dataspace::new(self.shape.clone(), self.max_shape.clone())?;

        if self.chunk_shape.len() != self.shape.len() {
            return Err(DatasetCreateError::InvalidChunkShapeDimensionality(
                self.chunk_shape.len(),
                self.shape.len(),
            ));
        }
        for (dim, (size, max)) in std::iter::zip(&self.chunk_shape, &self.max_shape).enumerate() {
            if let MaxExtent::Bounded(bound) = max
                && *bound > 0
                && size.get() > *bound
            {
                return Err(DatasetCreateError::ChunkExceedsMaxExtent {
                    dim,
                    size: size.get(),
                    max: *max,
                });
            }
        }

        if self.fill_value.size() != self.data_type.size() {
            return Err(DatasetCreateError::InvalidFillValue {
                data_type: self.data_type,
                len: self.fill_value.size(),
            });
        }

        match self.layout {
            StorageLayout::Compact | StorageLayout::Contiguous => {
                if !self.codecs.is_empty() {
                    return Err(DatasetCreateError::LayoutCodecs(self.layout));
                }
                if dataspace.is_growable() {
                    return Err(DatasetCreateError::LayoutNotGrowable(self.layout));
                }
                let expected = unchunked_shape(&self.shape);
                if self.chunk_shape.iter().map(|size| size.get()).ne(expected.iter().copied()) {
                    return Err(DatasetCreateError::LayoutChunkShape {
                        layout: self.layout,
                        chunk_shape: self.chunk_shape.iter().map(|size| size.get()).collect(),
                        expected,
                    });
                }
            }
            StorageLayout::Chunked => {}
        }
        if self.layout == StorageLayout::Compact {
            let limit = global_config().compact_size_limit();
            let size = self.size_bytes();
            if size > limit {
                return Err(DatasetCreateError::CompactTooLarge { size, limit });
            }
        }

        let codec_chain = CodecChain::from_metadata(&self.codecs)?;
        Ok((dataspace, codec_chain))
    }
}

/// The chunk shape of an unchunked layout: the shape, with empty dimensions of size one.
pub(crate) fn unchunked_shape(shape: &[u64]) -> ArrayShape {
    shape.iter().map(|&size| size.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;

    fn chunk_shape(shape: &[u64]) -> ChunkShape {
        shape
            .iter()
            .map(|&size| NonZeroU64::new(size).unwrap_or(NonZeroU64::MIN))
            .collect()
    }

    fn config() -> DatasetConfig {
        DatasetConfig {
            shape: vec![4, 7],
            max_shape: vec![MaxExtent::Bounded(6), MaxExtent::Unlimited],
            chunk_shape: chunk_shape(&[2, 4]),
            data_type: DataType::INT32,
            fill_value: FillValue::zero(&DataType::INT32),
            codecs: vec![],
            allocation_time: AllocationTime::Late,
            layout: StorageLayout::Chunked,
        }
    }

    #[test]
    fn dataset_config_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn dataset_config_invalid() {
        let mut invalid = config();
        invalid.chunk_shape = chunk_shape(&[2]);
        assert!(matches!(
            invalid.validate(),
            Err(DatasetCreateError::InvalidChunkShapeDimensionality(1, 2))
        ));

        let mut invalid = config();
        invalid.chunk_shape = chunk_shape(&[8, 4]);
        assert!(matches!(
            invalid.validate(),
            Err(DatasetCreateError::ChunkExceedsMaxExtent { dim: 0, size: 8, .. })
        ));

        let mut invalid = config();
        invalid.fill_value = FillValue::new(vec![0; 2]);
        assert!(matches!(
            invalid.validate(),
            Err(DatasetCreateError::InvalidFillValue { len: 2, .. })
        ));

        let mut invalid = config();
        invalid.codecs = vec![CodecMetadata::new("unknown")];
        assert!(matches!(
            invalid.validate(),
            Err(DatasetCreateError::CodecCreateError(_))
        ));

        let mut invalid = config();
        invalid.layout = StorageLayout::Contiguous;
        assert!(matches!(
            invalid.validate(),
            Err(DatasetCreateError::LayoutNotGrowable(StorageLayout::Contiguous))
        ));
    }

    #[test]
    fn dataset_config_unchunked() {
        let mut contiguous = config();
        contiguous.max_shape = vec![MaxExtent::Bounded(4), MaxExtent::Bounded(7)];
        contiguous.layout = StorageLayout::Contiguous;
        assert!(matches!(
            contiguous.validate(),
            Err(DatasetCreateError::LayoutChunkShape { .. })
        ));
        contiguous.chunk_shape = chunk_shape(&[4, 7]);
        assert!(contiguous.validate().is_ok());

        contiguous.codecs = vec![CodecMetadata::new("fletcher32")];
        assert!(matches!(
            contiguous.validate(),
            Err(DatasetCreateError::LayoutCodecs(StorageLayout::Contiguous))
        ));
        assert_eq!(unchunked_shape(&[0, 3]), vec![1, 3]);
    }

    #[test]
    fn dataset_config_serde() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&config())?;
        assert!(json.starts_with(r#"{"shape":[4,7],"max_shape":[6,null],"chunk_shape":[2,4],"#));
        assert!(json.ends_with(
            r#""fill_value":"AAAAAA==","codecs":[],"allocation_time":"late","layout":"chunked"}"#
        ));
        assert_eq!(serde_json::from_str::<DatasetConfig>(&json)?, config());
        Ok(())
    }
}
