//! The `gzip` bytes to bytes codec.
//!
//! Applies [gzip](https://datatracker.ietf.org/doc/html/rfc1952) compression.
//!
//! ### Codec `configuration` Example - [`GzipCodecConfiguration`]:
//! ```json
//! {
//!     "level": 9
//! }
//! ```

use std::{
    borrow::Cow,
    io::{Cursor, Read},
    sync::Arc,
};

use flate2::bufread::{GzDecoder, GzEncoder};
use serde::{Deserialize, Serialize};

use super::{DeflateCompressionLevel, DeflateCompressionLevelError};
use crate::{
    BytesRepresentation, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecMetadata,
    CodecOptions, CodecPlugin, CodecTraits, Configuration, RawBytes,
};

/// The name of the `gzip` codec.
pub const GZIP: &str = "gzip";

inventory::submit! {
    CodecPlugin::new(GZIP, create_codec_gzip)
}

fn create_codec_gzip(
    metadata: &CodecMetadata,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
    let configuration: GzipCodecConfiguration = metadata.to_configuration()?;
    Ok(Arc::new(GzipCodec::new_with_configuration(&configuration)))
}

/// `gzip` codec configuration parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct GzipCodecConfiguration {
    /// The compression level.
    pub level: DeflateCompressionLevel,
}

/// A `gzip` codec implementation.
#[derive(Clone, Debug)]
pub struct GzipCodec {
    compression_level: DeflateCompressionLevel,
}

impl GzipCodec {
    /// Create a new `gzip` codec.
    ///
    /// # Errors
    /// Returns [`DeflateCompressionLevelError`] if `compression_level` is not valid.
    pub fn new(compression_level: u32) -> Result<Self, DeflateCompressionLevelError> {
        let compression_level = DeflateCompressionLevel::new(compression_level)?;
        Ok(Self { compression_level })
    }

    /// Create a new `gzip` codec from configuration.
    #[must_use]
    pub fn new_with_configuration(configuration: &GzipCodecConfiguration) -> Self {
        Self {
            compression_level: configuration.level,
        }
    }
}

impl CodecTraits for GzipCodec {
    fn name(&self) -> &'static str {
        GZIP
    }

    fn configuration(&self) -> Configuration {
        let mut configuration = Configuration::new();
        configuration.insert("level".to_string(), self.compression_level.as_u32().into());
        configuration
    }
}

impl BytesToBytesCodecTraits for GzipCodec {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn BytesToBytesCodecTraits> {
        self as Arc<dyn BytesToBytesCodecTraits>
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let mut encoder = GzEncoder::new(Cursor::new(decoded_value), self.compression_level.into());
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
        let mut decoder = GzDecoder::new(Cursor::new(encoded_value));
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
                // https://www.gnu.org/software/gzip/manual/gzip.pdf
                const HEADER_TRAILER_OVERHEAD: u64 = 10 + 8;
                const BLOCK_SIZE: u64 = 32768;
                const BLOCK_OVERHEAD: u64 = 5;
                let blocks_overhead = BLOCK_OVERHEAD * size.div_ceil(BLOCK_SIZE).max(1);
                BytesRepresentation::BoundedSize(size + HEADER_TRAILER_OVERHEAD + blocks_overhead)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_VALID: &str = r#"{
        "level": 1
    }"#;

    #[test]
    fn codec_gzip_configuration_valid() {
        assert!(serde_json::from_str::<GzipCodecConfiguration>(JSON_VALID).is_ok());
    }

    #[test]
    fn codec_gzip_configuration_invalid() {
        assert!(serde_json::from_str::<GzipCodecConfiguration>(r#"{"level": -1}"#).is_err());
        assert!(serde_json::from_str::<GzipCodecConfiguration>(r#"{"level": 10}"#).is_err());
        assert!(GzipCodec::new(10).is_err());
    }

    #[test]
    fn codec_gzip_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let elements: Vec<u16> = (0..32 * 64).map(|i| (i % 64) as u16).collect();
        let bytes: Vec<u8> = elements.iter().flat_map(|e| e.to_ne_bytes()).collect();
        let representation = BytesRepresentation::FixedSize(bytes.len() as u64);

        let configuration: GzipCodecConfiguration = serde_json::from_str(JSON_VALID)?;
        let codec = GzipCodec::new_with_configuration(&configuration);

        let encoded = codec.encode(Cow::Borrowed(&bytes), &CodecOptions::default())?;
        assert!(encoded.len() < bytes.len());
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
        let decoded = codec.decode(encoded, &representation, &CodecOptions::default())?;
        assert_eq!(bytes, decoded.as_ref());
        Ok(())
    }

    #[test]
    fn codec_gzip_empty() -> Result<(), Box<dyn std::error::Error>> {
        let codec = GzipCodec::new(9)?;
        let encoded = codec.encode(Cow::Borrowed(&[]), &CodecOptions::default())?;
        let representation = BytesRepresentation::FixedSize(0);
        assert!(encoded.len() as u64 <= codec.encoded_representation(&representation).size().unwrap_or(0));
        let decoded = codec.decode(encoded, &representation, &CodecOptions::default())?;
        assert!(decoded.is_empty());
        Ok(())
    }
}
