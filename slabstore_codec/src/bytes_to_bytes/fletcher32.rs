//! The `fletcher32` bytes to bytes codec.
//!
//! Appends a Fletcher-32 checksum of the input bytes, computed the way the HDF5 fletcher32 filter computes it:
//! the input is read as big-endian 16-bit words (a trailing odd byte is the high byte of a final word),
//! both running sums are reduced modulo 65535, and the checksum `(sum2 << 16) | sum1` is stored as a little-endian trailer.
//!
//! ### Codec `configuration` Example:
//! ```json
//! {}
//! ```

use std::{borrow::Cow, sync::Arc};

use super::{CHECKSUM_SIZE, checksum_representation, split_checksum};
use crate::{
    BytesRepresentation, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecMetadata,
    CodecOptions, CodecPlugin, CodecProperties, CodecTraits, Configuration, RawBytes,
};

/// The name of the `fletcher32` codec.
pub const FLETCHER32: &str = "fletcher32";

inventory::submit! {
    CodecPlugin::new(FLETCHER32, create_codec_fletcher32)
}

fn create_codec_fletcher32(
    _metadata: &CodecMetadata,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
    Ok(Arc::new(Fletcher32Codec::new()))
}

/// Compute the Fletcher-32 checksum of `data`.
#[must_use]
pub fn fletcher32(data: &[u8]) -> u32 {
    // reduce every 360 words, the sums cannot overflow in between
    const BLOCK_WORDS: usize = 360;
    let mut sum1: u64 = 0;
    let mut sum2: u64 = 0;

    let (words, remainder) = data.as_chunks::<2>();
    for block in words.chunks(BLOCK_WORDS) {
        for word in block {
            sum1 += u64::from(u16::from_be_bytes(*word));
            sum2 += sum1;
        }
        sum1 %= 65535;
        sum2 %= 65535;
    }
    if let [last] = remainder {
        sum1 = (sum1 + (u64::from(*last) << 8)) % 65535;
        sum2 = (sum2 + sum1) % 65535;
    }

    // both sums are below 65535
    #[allow(clippy::cast_possible_truncation)]
    let checksum = ((sum2 << 16) | sum1) as u32;
    checksum
}

/// A `fletcher32` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct Fletcher32Codec;

impl Fletcher32Codec {
    /// Create a new `fletcher32` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CodecTraits for Fletcher32Codec {
    fn name(&self) -> &'static str {
        FLETCHER32
    }

    fn configuration(&self) -> Configuration {
        Configuration::new()
    }

    fn properties(&self) -> CodecProperties {
        CodecProperties::CHECKSUM
    }
}

impl BytesToBytesCodecTraits for Fletcher32Codec {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn BytesToBytesCodecTraits> {
        self as Arc<dyn BytesToBytesCodecTraits>
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let checksum = fletcher32(&decoded_value).to_le_bytes();
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
        let (payload, stored) = split_checksum(FLETCHER32, &encoded_value)?;
        if options.validate_checksums() {
            let computed = fletcher32(payload);
            if computed != stored {
                return Err(CodecError::InvalidChecksum {
                    codec: FLETCHER32,
                    expected: stored,
                    computed,
                });
            }
        }
        let len = payload.len();
        match encoded_value {
            Cow::Borrowed(encoded_value) => Ok(Cow::Borrowed(&encoded_value[..len])),
            Cow::Owned(mut encoded_value) => {
                encoded_value.truncate(len);
                Ok(Cow::Owned(encoded_value))
            }
        }
    }

    fn encoded_representation(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        checksum_representation(decoded_representation)
    }
}
