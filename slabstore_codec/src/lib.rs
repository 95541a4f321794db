//! The codec API for the `slabstore` crate.
//!
//! A [`CodecChain`] is an ordered sequence of bytes to bytes codecs.
//! Chunk bytes pass through each codec in order on encode, and in reverse order on decode.
//! Checksum codecs must come last, so their checksums are verified before anything else is decoded.
//!
//! Codecs are created from [`CodecMetadata`] through a process-wide registry.
//! Built-in codecs are registered at compile time with [`inventory`], and further codecs can be registered at runtime with [`register_codec`].
//!
//! ## Codecs
//! - `shuffle`: byte shuffle.
//! - `gzip`: deflate with gzip framing (requires the `gzip` feature).
//! - `zlib`: deflate with zlib framing (requires the `zlib` feature).
//! - `lzf`: LZF compression (requires the `lzf` feature).
//! - `zstd`: Zstandard compression (requires the `zstd` feature, experimental).
//! - `fletcher32`: a trailing Fletcher-32 checksum.
//! - `crc32c`: a trailing CRC32C checksum (requires the `crc32c` feature).
//!
//! ## Licence
//! `slabstore_codec` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

pub mod bytes_to_bytes;
mod bytes_representation;
mod codec_chain;
mod codec_metadata;
mod options;
mod registry;

use std::{borrow::Cow, sync::Arc};

use thiserror::Error;

pub use bytes_representation::BytesRepresentation;
pub use codec_chain::CodecChain;
pub use codec_metadata::{CodecMetadata, Configuration};
pub use options::CodecOptions;
pub use registry::{
    CODEC_RUNTIME_REGISTRY, CodecInfo, CodecPlugin, CodecRuntimeRegistryHandle, RuntimeRegistry,
    codec_available, codec_info, create_codec, register_codec, registered_codecs,
    unregister_codec,
};

/// Raw bytes flowing through a codec.
///
/// Codecs that do not alter their input can pass it through without copying.
pub type RawBytes<'a> = Cow<'a, [u8]>;

/// Properties of a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecProperties {
    /// Decoding reproduces exactly the bytes that were encoded.
    pub lossless: bool,
    /// The codec appends and validates a checksum without altering the payload.
    pub checksum: bool,
}

impl CodecProperties {
    /// Properties of a lossless transform.
    pub const LOSSLESS: Self = Self {
        lossless: true,
        checksum: false,
    };

    /// Properties of a checksum codec.
    pub const CHECKSUM: Self = Self {
        lossless: true,
        checksum: true,
    };
}

/// Codec traits.
pub trait CodecTraits: Send + Sync {
    /// The registered name of the codec.
    fn name(&self) -> &'static str;

    /// The configuration of the codec.
    fn configuration(&self) -> Configuration;

    /// The properties of the codec.
    fn properties(&self) -> CodecProperties {
        CodecProperties::LOSSLESS
    }

    /// Create the metadata of the codec.
    fn create_metadata(&self) -> CodecMetadata {
        CodecMetadata::new_with_configuration(self.name(), self.configuration())
    }
}

/// Traits for bytes to bytes codecs.
pub trait BytesToBytesCodecTraits: CodecTraits + core::fmt::Debug {
    /// Return a dynamic version of the codec.
    fn into_dyn(self: Arc<Self>) -> Arc<dyn BytesToBytesCodecTraits>;

    /// Returns the size of the encoded representation given a size of the decoded representation.
    fn encoded_representation(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation;

    /// Encode chunk bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError>;

    /// Decode chunk bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        decoded_representation: &BytesRepresentation,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError>;
}

/// A codec error.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
    /// An embedded checksum does not match the decoded value.
    #[error("the {codec} checksum is invalid, stored {expected:#010x} computed {computed:#010x}")]
    InvalidChecksum {
        /// The name of the checksum codec.
        codec: &'static str,
        /// The stored checksum.
        expected: u32,
        /// The checksum computed from the payload.
        computed: u32,
    },
    /// The decoded size of a chunk did not match what was expected.
    #[error("the size of a decoded chunk is {len}, expected {expected}")]
    UnexpectedDecodedSize {
        /// The decoded length.
        len: u64,
        /// The expected length.
        expected: u64,
    },
    /// The codec is registered with encoding disabled.
    #[error("encoding is disabled for codec {0}")]
    EncodingDisabled(String),
    /// The codecs recorded for a chunk differ from the codec chain.
    #[error("chunk was encoded with {stored:?}, the codec chain is {chain:?}")]
    CodecMismatch {
        /// The codec names recorded for the chunk.
        stored: Vec<String>,
        /// The codec names of the chain.
        chain: Vec<String>,
    },
    /// Other
    #[error("{0}")]
    Other(String),
}

impl CodecError {
    /// Returns true if the error is a checksum mismatch.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::InvalidChecksum { .. })
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}

impl From<&str> for CodecError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for CodecError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// A codec creation error.
#[derive(Debug, Clone, Error)]
pub enum CodecCreateError {
    /// No codec is registered with this name.
    #[error("codec {0} is not registered")]
    UnknownCodec(String),
    /// The codec configuration is invalid.
    #[error("codec {name} has an invalid configuration: {reason}")]
    InvalidConfiguration {
        /// The codec name.
        name: String,
        /// Why the configuration was rejected.
        reason: String,
    },
    /// A checksum codec is followed by a codec that alters the payload.
    #[error("checksum codec {0} must be last in the codec chain")]
    ChecksumNotLast(String),
}
