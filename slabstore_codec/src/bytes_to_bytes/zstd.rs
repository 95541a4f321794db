//! The `zstd` bytes to bytes codec (Experimental).
//!
//! <div class="warning">
//! This codec is experimental and its stored format may change.
//! </div>
//!
//! Applies [Zstandard](https://tools.ietf.org/html/rfc8478) compression.
//!
//! ### Codec `configuration` Example - [`ZstdCodecConfiguration`]:
//! ```json
//! {
//!     "level": 1,
//!     "checksum": false
//! }
//! ```

use std::{borrow::Cow, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    BytesRepresentation, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecMetadata,
    CodecOptions, CodecPlugin, CodecTraits, Configuration, RawBytes,
};

/// The name of the `zstd` codec.
pub const ZSTD: &str = "zstd";

inventory::submit! {
    CodecPlugin::new(ZSTD, create_codec_zstd)
}

fn create_codec_zstd(
    metadata: &CodecMetadata,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
    let configuration: ZstdCodecConfiguration = metadata.to_configuration()?;
    let range = zstd::compression_level_range();
    if !range.contains(&configuration.level) {
        return Err(CodecCreateError::InvalidConfiguration {
            name: ZSTD.to_string(),
            reason: format!(
                "compression level {} is outside {}..={}",
                configuration.level,
                range.start(),
                range.end()
            ),
        });
    }
    Ok(Arc::new(ZstdCodec::new_with_configuration(&configuration)))
}

/// `zstd` codec configuration parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
pub struct ZstdCodecConfiguration {
    /// The compression level.
    pub level: i32,
    /// Whether the frame carries a content checksum.
    #[serde(default)]
    pub checksum: bool,
}

/// A `zstd` codec implementation.
#[derive(Clone, Debug)]
pub struct ZstdCodec {
    compression: i32,
    checksum: bool,
}

impl ZstdCodec {
    /// Create a new `zstd` codec.
    #[must_use]
    pub fn new(compression: i32, checksum: bool) -> Self {
        log::warn!("the zstd codec is experimental");
        Self {
            compression,
            checksum,
        }
    }

    /// Create a new `zstd` codec from configuration.
    #[must_use]
    pub fn new_with_configuration(configuration: &ZstdCodecConfiguration) -> Self {
        Self::new(configuration.level, configuration.checksum)
    }
}

impl CodecTraits for ZstdCodec {
    fn name(&self) -> &'static str {
        ZSTD
    }

    fn configuration(&self) -> Configuration {
        let mut configuration = Configuration::new();
        configuration.insert("level".to_string(), self.compression.into());
        configuration.insert("checksum".to_string(), self.checksum.into());
        configuration
    }
}

impl BytesToBytesCodecTraits for ZstdCodec {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn BytesToBytesCodecTraits> {
        self as Arc<dyn BytesToBytesCodecTraits>
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let mut compressor = zstd::bulk::Compressor::new(self.compression)?;
        compressor.include_checksum(self.checksum)?;
        Ok(Cow::Owned(compressor.compress(&decoded_value)?))
    }

    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        _decoded_representation: &BytesRepresentation,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        Ok(Cow::Owned(zstd::stream::decode_all(encoded_value.as_ref())?))
    }

    fn encoded_representation(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        decoded_representation
            .size()
            .map_or(BytesRepresentation::UnboundedSize, |size| {
                // https://github.com/facebook/zstd/blob/v1.5.6/lib/zstd.h#L264
                let margin = if size < (128 << 10) {
                    ((128 << 10) - size) >> 11
                } else {
                    0
                };
                // frame checksum
                let checksum = 4;
                BytesRepresentation::BoundedSize(size + (size >> 8) + margin + checksum)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_zstd_configuration() {
        assert!(serde_json::from_str::<ZstdCodecConfiguration>(r#"{"level": 22}"#).is_ok());
        assert!(create_codec_zstd(&CodecMetadata::new_with_configuration(
            ZSTD,
            serde_json::from_str(r#"{"level": 100}"#).unwrap_or_default()
        ))
        .is_err());
    }

    #[test]
    fn codec_zstd_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let bytes: Vec<u8> = (0..4096u32).flat_map(|i| (i / 16).to_le_bytes()).collect();
        let representation = BytesRepresentation::FixedSize(bytes.len() as u64);
        for checksum in [false, true] {
            let codec = ZstdCodec::new(5, checksum);
            let encoded = codec.encode(Cow::Borrowed(&bytes), &CodecOptions::default())?;
            assert!(encoded.len() < bytes.len());
            let decoded = codec.decode(encoded, &representation, &CodecOptions::default())?;
            assert_eq!(bytes, decoded.as_ref());
        }
        Ok(())
    }

    #[test]
    fn codec_zstd_warns() {
        testing_logger::setup();
        let _codec = ZstdCodec::new(1, false);
        testing_logger::validate(|captured_logs| {
            assert!(
                captured_logs
                    .iter()
                    .any(|log| log.level == log::Level::Warn && log.body.contains("experimental"))
            );
        });
    }
}
