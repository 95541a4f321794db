use serde::{Deserialize, Serialize};

use slabstore_storage::ChunkStoreMetadata;

use super::{DatasetConfig, fill_value::base64_bytes};

/// The current dataset metadata version.
pub(crate) const DATASET_METADATA_VERSION: u32 = 1;

/// The persisted state of a dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DatasetMetadata {
    pub(crate) version: u32,
    #[serde(flatten)]
    pub(crate) config: DatasetConfig,
    pub(crate) chunk_store: ChunkStoreMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) compact: Option<CompactData>,
}

/// The inline data of a compact dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct CompactData(#[serde(with = "base64_bytes")] pub(crate) Vec<u8>);
