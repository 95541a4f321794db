//! The `shuffle` bytes to bytes codec.
//!
//! Reorders bytes so that byte `k` of every element is stored together, which usually improves the compression of numeric data.
//! Trailing bytes that do not form a whole element are stored unchanged.
//!
//! ### Codec `configuration` Example - [`ShuffleCodecConfiguration`]:
//! ```json
//! {
//!     "elementsize": 4
//! }
//! ```

use std::{borrow::Cow, num::NonZeroUsize, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    BytesRepresentation, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecMetadata,
    CodecOptions, CodecPlugin, CodecTraits, Configuration, RawBytes,
};

/// The name of the `shuffle` codec.
pub const SHUFFLE: &str = "shuffle";

inventory::submit! {
    CodecPlugin::new(SHUFFLE, create_codec_shuffle)
}

fn create_codec_shuffle(
    metadata: &CodecMetadata,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
    let configuration: ShuffleCodecConfiguration = metadata.to_configuration()?;
    Ok(Arc::new(ShuffleCodec::new_with_configuration(&configuration)))
}

/// `shuffle` codec configuration parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct ShuffleCodecConfiguration {
    /// The size of an element in bytes.
    pub elementsize: NonZeroUsize,
}

/// A `shuffle` codec implementation.
#[derive(Clone, Debug)]
pub struct ShuffleCodec {
    elementsize: NonZeroUsize,
}

impl ShuffleCodec {
    /// Create a new `shuffle` codec.
    #[must_use]
    pub fn new(elementsize: NonZeroUsize) -> Self {
        Self { elementsize }
    }

    /// Create a new `shuffle` codec from configuration.
    #[must_use]
    pub fn new_with_configuration(configuration: &ShuffleCodecConfiguration) -> Self {
        Self::new(configuration.elementsize)
    }
}

impl CodecTraits for ShuffleCodec {
    fn name(&self) -> &'static str {
        SHUFFLE
    }

    fn configuration(&self) -> Configuration {
        let mut configuration = Configuration::new();
        configuration.insert("elementsize".to_string(), self.elementsize.get().into());
        configuration
    }
}

impl BytesToBytesCodecTraits for ShuffleCodec {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn BytesToBytesCodecTraits> {
        self as Arc<dyn BytesToBytesCodecTraits>
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let elementsize = self.elementsize.get();
        if elementsize == 1 {
            return Ok(decoded_value);
        }
        let count = decoded_value.len() / elementsize;
        let mut encoded_value = decoded_value.to_vec();
        for i in 0..count {
            let offset = i * elementsize;
            for byte_index in 0..elementsize {
                encoded_value[byte_index * count + i] = decoded_value[offset + byte_index];
            }
        }
        Ok(Cow::Owned(encoded_value))
    }

    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        _decoded_representation: &BytesRepresentation,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let elementsize = self.elementsize.get();
        if elementsize == 1 {
            return Ok(encoded_value);
        }
        let count = encoded_value.len() / elementsize;
        let mut decoded_value = encoded_value.to_vec();
        for byte_index in 0..elementsize {
            let offset = byte_index * count;
            for i in 0..count {
                decoded_value[i * elementsize + byte_index] = encoded_value[offset + i];
            }
        }
        Ok(Cow::Owned(decoded_value))
    }

    fn encoded_representation(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        *decoded_representation
    }
}
