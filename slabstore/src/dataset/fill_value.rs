use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};

use super::{DataType, Element};

/// The fill value of a dataset.
///
/// The bytes of a single element in the byte order of the dataset [`DataType`].
/// Serialised as base64.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Deref, From)]
#[serde(transparent)]
pub struct FillValue(#[serde(with = "base64_bytes")] Vec<u8>);

impl FillValue {
    /// Create a fill value from raw bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Create a zero fill value for `data_type`.
    #[must_use]
    pub fn zero(data_type: &DataType) -> Self {
        Self(vec![0; data_type.size()])
    }

    /// Create a fill value from an element, converted to the byte order of `data_type`.
    ///
    /// Returns [`None`] if the element is incompatible with `data_type`.
    #[must_use]
    pub fn from_element<T: Element>(data_type: &DataType, element: T) -> Option<Self> {
        T::to_bytes(data_type, &[element])
            .ok()
            .map(|bytes| Self(bytes.into_owned()))
    }

    /// The fill value bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The size of the fill value in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return `num_elements` repetitions of the fill value.
    #[must_use]
    pub fn repeat(&self, num_elements: usize) -> Vec<u8> {
        self.0.repeat(num_elements)
    }
}

pub(crate) mod base64_bytes {
    use base64::{Engine, prelude::BASE64_STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
