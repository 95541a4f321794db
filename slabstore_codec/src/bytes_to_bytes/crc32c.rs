//! The `crc32c` bytes to bytes codec.
//!
//! Appends a CRC32C checksum of the input bytes as a little-endian trailer.

use std::{borrow::Cow, sync::Arc};

use super::{CHECKSUM_SIZE, checksum_representation, split_checksum};
use crate::{
    BytesRepresentation, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecMetadata,
    CodecOptions, CodecPlugin, CodecProperties, CodecTraits, Configuration, RawBytes,
};

/// The name of the `crc32c` codec.
pub const CRC32C: &str = "crc32c";

inventory::submit! {
    CodecPlugin::new(CRC32C, create_codec_crc32c)
}

fn create_codec_crc32c(
    _metadata: &CodecMetadata,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
    Ok(Arc::new(Crc32cCodec::new()))
}

/// A `crc32c` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct Crc32cCodec;

impl Crc32cCodec {
    /// Create a new `crc32c` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CodecTraits for Crc32cCodec {
    fn name(&self) -> &'static str {
        CRC32C
    }

    fn configuration(&self) -> Configuration {
        Configuration::new()
    }

    fn properties(&self) -> CodecProperties {
        CodecProperties::CHECKSUM
    }
}

impl BytesToBytesCodecTraits for Crc32cCodec {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn BytesToBytesCodecTraits> {
        self as Arc<dyn BytesToBytesCodecTraits>
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let checksum = crc32c::crc32c(&decoded_value).to_le_bytes();
        let mut encoded_value: Vec<u8> = Vec::with_capacity(decoded_value.len() + CHECKSUM_SIZE);
        encoded_value.extend_from_slice(&decoded_value);
        encoded_value.extend_from_slice(&checksum);
        Ok(Cow::Owned(encoded_value))
    }

    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        _decoded_representation: &BytesRepresentation,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let (payload, stored) = split_checksum(CRC32C, &encoded_value)?;
        if options.validate_checksums() {
            let computed = crc32c::crc32c(payload);
            if computed != stored {
                return Err(CodecError::InvalidChecksum {
                    codec: CRC32C,
                    expected: stored,
                    computed,
                });
            }
        }
        Ok(Cow::Owned(payload.to_vec()))
    }

    fn encoded_representation(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        checksum_representation(decoded_representation)
    }
}
