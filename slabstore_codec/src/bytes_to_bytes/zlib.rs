//! The `zlib` bytes to bytes codec.
//!
//! Applies [zlib](https://datatracker.ietf.org/doc/html/rfc1950) compression.
//! This is the deflate framing used by the HDF5 deflate filter.
//!
//! ### Codec `configuration` Example - [`ZlibCodecConfiguration`]:
//! ```json
//! {
//!     "level": 6
//! }
//! ```

use std::{
    borrow::Cow,
    io::{Cursor, Read},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use super::{DeflateCompressionLevel, DeflateCompressionLevelError};
use crate::{
    BytesRepresentation, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecMetadata,
    CodecOptions, CodecPlugin, CodecTraits, Configuration, RawBytes,
};

/// The name of the `zlib` codec.
pub const ZLIB: &str = "zlib";

inventory::submit! {
    CodecPlugin::new(ZLIB, create_codec_zlib)
}

fn create_codec_zlib(
    metadata: &CodecMetadata,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
    let configuration: ZlibCodecConfiguration = metadata.to_configuration()?;
    Ok(Arc::new(ZlibCodec::new_with_configuration(&configuration)))
}

/// `zlib` codec configuration parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct ZlibCodecConfiguration {
    /// The compression level.
    pub level: DeflateCompressionLevel,
}

/// A `zlib` codec implementation.
#[derive(Clone, Debug)]
pub struct ZlibCodec {
    compression_level: DeflateCompressionLevel,
}

impl ZlibCodec {
    /// Create a new `zlib` codec.
    ///
    /// # Errors
    /// Returns [`DeflateCompressionLevelError`] if `level` is not valid.
    pub fn new(level: u32) -> Result<Self, DeflateCompressionLevelError> {
        Ok(Self {
            compression_level: DeflateCompressionLevel::new(level)?,
        })
    }

    /// Create a new `zlib` codec from configuration.
    #[must_use]
    pub fn new_with_configuration(configuration: &ZlibCodecConfiguration) -> Self {
        Self {
            compression_level: configuration.level,
        }
    }
}

impl CodecTraits for ZlibCodec {
    fn name(&self) -> &'static str {
        ZLIB
    }

    fn configuration(&self) -> Configuration {
        let mut configuration = Configuration::new();
        configuration.insert("level".to_string(), self.compression_level.as_u32().into());
        configuration
    }
}

impl BytesToBytesCodecTraits for ZlibCodec {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn BytesToBytesCodecTraits> {
        self as Arc<dyn BytesToBytesCodecTraits>
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let mut encoder =
            flate2::read::ZlibEncoder::new(Cursor::new(decoded_value), self.compression_level.into());
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(Cow::Owned(out))
    }

    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        _decoded_representation: &BytesRepresentation,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let mut decoder = flate2::read::ZlibDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(Cow::Owned(out))
    }

    fn encoded_representation(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        decoded_representation
            .size()
            .map_or(BytesRepresentation::UnboundedSize, |size| {
                // https://github.com/madler/zlib/blob/v1.3.1/compress.c#L72-L75
                BytesRepresentation::BoundedSize(
                    size + (size >> 12) + (size >> 14) + (size >> 25) + 13,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_zlib_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let bytes: Vec<u8> = (0..1000u32).flat_map(|i| (i % 10).to_be_bytes()).collect();
        let representation = BytesRepresentation::FixedSize(bytes.len() as u64);
        let codec = ZlibCodec::new(9)?;
        let encoded = codec.encode(Cow::Borrowed(&bytes), &CodecOptions::default())?;
        assert!(encoded.len() < bytes.len());
        assert_eq!(encoded[0], 0x78);
        let decoded = codec.decode(encoded, &representation, &CodecOptions::default())?;
        assert_eq!(bytes, decoded.as_ref());
        Ok(())
    }

    #[test]
    fn codec_zlib_decode_reference() -> Result<(), Box<dyn std::error::Error>> {
        // zlib.compress(bytes(range(10)), 6)
        let encoded: Vec<u8> = vec![
            120, 156, 99, 96, 100, 98, 102, 97, 101, 99, 231, 224, 4, 0, 0, 175, 0, 46,
        ];
        let codec = ZlibCodec::new(6)?;
        let decoded = codec.decode(
            Cow::Owned(encoded),
            &BytesRepresentation::FixedSize(10),
            &CodecOptions::default(),
        )?;
        assert_eq!(decoded.as_ref(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        Ok(())
    }

    #[test]
    fn codec_zlib_corrupt() -> Result<(), Box<dyn std::error::Error>> {
        let codec = ZlibCodec::new(6)?;
        let result = codec.decode(
            Cow::Owned(vec![120, 156, 255, 255, 255]),
            &BytesRepresentation::FixedSize(10),
            &CodecOptions::default(),
        );
        assert!(result.is_err());
        Ok(())
    }
}
