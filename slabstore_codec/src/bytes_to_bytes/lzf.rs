//! The `lzf` bytes to bytes codec.
//!
//! Applies [LZF](http://oldhome.schmorp.de/marc/liblzf.html) compression, the fast compressor of the h5py LZF filter.
//!
//! The encoded value starts with a 9 byte header: the decoded length as a little-endian `u64` and a mode byte.
//! Mode `1` is followed by the LZF stream.
//! Mode `0` is followed by the input bytes unchanged, and is written when LZF cannot shrink the input.
//!
//! ### Codec `configuration` Example:
//! ```json
//! {}
//! ```

use std::{borrow::Cow, sync::Arc};

use crate::{
    BytesRepresentation, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecMetadata,
    CodecOptions, CodecPlugin, CodecTraits, Configuration, RawBytes,
};

/// The name of the `lzf` codec.
pub const LZF: &str = "lzf";

const HEADER_SIZE: usize = size_of::<u64>() + 1;
const MODE_STORED: u8 = 0;
const MODE_COMPRESSED: u8 = 1;

inventory::submit! {
    CodecPlugin::new(LZF, create_codec_lzf)
}

fn create_codec_lzf(
    _metadata: &CodecMetadata,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, CodecCreateError> {
    Ok(Arc::new(LzfCodec::new()))
}

/// An `lzf` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct LzfCodec;

impl LzfCodec {
    /// Create a new `lzf` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CodecTraits for LzfCodec {
    fn name(&self) -> &'static str {
        LZF
    }

    fn configuration(&self) -> Configuration {
        Configuration::new()
    }
}

impl BytesToBytesCodecTraits for LzfCodec {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn BytesToBytesCodecTraits> {
        self as Arc<dyn BytesToBytesCodecTraits>
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let (mode, payload) = if decoded_value.is_empty() {
            (MODE_STORED, Cow::Borrowed(decoded_value.as_ref()))
        } else {
            match lzf::compress(&decoded_value) {
                Ok(compressed) if compressed.len() < decoded_value.len() => {
                    (MODE_COMPRESSED, Cow::Owned(compressed))
                }
                Ok(_) | Err(lzf::LzfError::NoCompressionPossible) => {
                    (MODE_STORED, Cow::Borrowed(decoded_value.as_ref()))
                }
                Err(err) => return Err(CodecError::Other(format!("lzf encode failed: {err:?}"))),
            }
        };
        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        out.extend_from_slice(&(decoded_value.len() as u64).to_le_bytes());
        out.push(mode);
        out.extend_from_slice(&payload);
        Ok(Cow::Owned(out))
    }

    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        _decoded_representation: &BytesRepresentation,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let Some((header, payload)) = encoded_value.split_first_chunk::<HEADER_SIZE>() else {
            return Err(CodecError::Other(format!(
                "lzf decoder expects at least {HEADER_SIZE} bytes, got {}",
                encoded_value.len()
            )));
        };
        let (length, mode) = header.split_at(size_of::<u64>());
        let mut length_bytes = [0; size_of::<u64>()];
        length_bytes.copy_from_slice(length);
        let decoded_len = usize::try_from(u64::from_le_bytes(length_bytes))
            .map_err(|_| CodecError::Other("lzf decoded length exceeds usize".to_string()))?;

        let decoded = match mode {
            [MODE_STORED] => payload.to_vec(),
            [MODE_COMPRESSED] => lzf::decompress(payload, decoded_len)
                .map_err(|err| CodecError::Other(format!("lzf decode failed: {err:?}")))?,
            _ => return Err(CodecError::Other(format!("lzf mode {mode:?} is not valid"))),
        };
        if decoded.len() != decoded_len {
            return Err(CodecError::UnexpectedDecodedSize {
                len: decoded.len() as u64,
                expected: decoded_len as u64,
            });
        }
        Ok(Cow::Owned(decoded))
    }

    fn encoded_representation(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        decoded_representation
            .size()
            .map_or(BytesRepresentation::UnboundedSize, |size| {
                BytesRepresentation::BoundedSize(size + HEADER_SIZE as u64)
            })
    }
}
