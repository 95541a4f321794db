//! An ordered chain of bytes to bytes codecs.

use std::sync::Arc;

use itertools::Itertools;

use crate::{
    BytesRepresentation, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecMetadata,
    CodecOptions, RawBytes, codec_info, create_codec,
};

/// A chain of bytes to bytes codecs.
///
/// Encoding applies each codec in order.
/// Decoding applies each codec in reverse order, so checksum codecs (which must be last) are verified first.
#[derive(Debug, Clone, Default)]
pub struct CodecChain {
    codecs: Vec<Arc<dyn BytesToBytesCodecTraits>>,
    encoding_disabled: Option<String>,
}

impl CodecChain {
    /// Create a new codec chain.
    ///
    /// # Errors
    /// Returns [`CodecCreateError::ChecksumNotLast`] if a checksum codec is followed by a codec that is not a checksum.
    pub fn new(codecs: Vec<Arc<dyn BytesToBytesCodecTraits>>) -> Result<Self, CodecCreateError> {
        if let Some((checksum, _)) = codecs
            .iter()
            .tuple_windows()
            .find(|(a, b)| a.properties().checksum && !b.properties().checksum)
        {
            return Err(CodecCreateError::ChecksumNotLast(checksum.name().to_string()));
        }
        let encoding_disabled = codecs
            .iter()
            .map(|codec| codec.name())
            .find(|name| codec_info(name).is_some_and(|info| !info.encode_enabled))
            .map(str::to_string);
        Ok(Self {
            codecs,
            encoding_disabled,
        })
    }

    /// Create a new codec chain from a list of metadata.
    ///
    /// # Errors
    /// Returns a [`CodecCreateError`] if a codec is not registered, its configuration is invalid, or the chain is invalid.
    pub fn from_metadata(metadatas: &[CodecMetadata]) -> Result<Self, CodecCreateError> {
        let codecs: Vec<_> = metadatas.iter().map(create_codec).try_collect()?;
        Self::new(codecs)
    }

    /// Create the metadata of the codec chain.
    #[must_use]
    pub fn create_metadata(&self) -> Vec<CodecMetadata> {
        self.codecs
            .iter()
            .map(|codec| codec.create_metadata())
            .collect()
    }

    /// The codecs, in encode order.
    #[must_use]
    pub fn codecs(&self) -> &[Arc<dyn BytesToBytesCodecTraits>] {
        &self.codecs
    }

    /// The codec names, in encode order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.codecs
            .iter()
            .map(|codec| codec.name().to_string())
            .collect()
    }

    /// The number of codecs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Returns true if the chain has no codecs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Returns true if the chain has a checksum codec.
    #[must_use]
    pub fn has_checksum(&self) -> bool {
        self.codecs.iter().any(|codec| codec.properties().checksum)
    }

    /// Returns the encoded representation of the chain given the decoded representation.
    #[must_use]
    pub fn encoded_representation(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        self.codecs
            .iter()
            .fold(*decoded_representation, |representation, codec| {
                codec.encoded_representation(&representation)
            })
    }

    /// Encode chunk bytes.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if a codec fails or encoding is disabled for a codec in the chain.
    pub fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        if let Some(name) = &self.encoding_disabled {
            return Err(CodecError::EncodingDisabled(name.clone()));
        }
        self.codecs
            .iter()
            .try_fold(decoded_value, |value, codec| codec.encode(value, options))
    }

    /// Decode chunk bytes.
    ///
    /// `decoded_representation` is the representation of the bytes input to [`encode`](CodecChain::encode).
    ///
    /// # Errors
    /// Returns a [`CodecError`] if a codec fails, a checksum is invalid, or the decoded size does not match a fixed `decoded_representation`.
    pub fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        decoded_representation: &BytesRepresentation,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let mut representations = Vec::with_capacity(self.codecs.len());
        let mut representation = *decoded_representation;
        for codec in &self.codecs {
            representations.push(representation);
            representation = codec.encoded_representation(&representation);
        }

        let mut value = encoded_value;
        for (codec, representation) in std::iter::zip(&self.codecs, &representations).rev() {
            value = codec.decode(value, representation, options)?;
        }

        if let BytesRepresentation::FixedSize(expected) = decoded_representation
            && value.len() as u64 != *expected
        {
            return Err(CodecError::UnexpectedDecodedSize {
                len: value.len() as u64,
                expected: *expected,
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::bytes_to_bytes::{fletcher32::Fletcher32Codec, shuffle::ShuffleCodec};

    fn shuffle() -> Arc<dyn BytesToBytesCodecTraits> {
        Arc::new(ShuffleCodec::new(NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN)))
    }

    fn bytes() -> Vec<u8> {
        (0..64u32).flat_map(u32::to_le_bytes).collect()
    }

    #[test]
    fn codec_chain_empty() -> Result<(), Box<dyn std::error::Error>> {
        let chain = CodecChain::new(vec![])?;
        let bytes = bytes();
        let encoded = chain.encode(RawBytes::from(&bytes), &CodecOptions::default())?;
        assert_eq!(encoded.as_ref(), bytes.as_slice());
        let decoded = chain.decode(
            encoded,
            &BytesRepresentation::FixedSize(256),
            &CodecOptions::default(),
        )?;
        assert_eq!(decoded.as_ref(), bytes.as_slice());
        Ok(())
    }

    #[test]
    fn codec_chain_checksum_last() {
        let fletcher32: Arc<dyn BytesToBytesCodecTraits> = Arc::new(Fletcher32Codec::new());
        assert!(CodecChain::new(vec![shuffle(), fletcher32.clone()]).is_ok());
        assert!(matches!(
            CodecChain::new(vec![fletcher32.clone(), shuffle()]),
            Err(CodecCreateError::ChecksumNotLast(name)) if name == "fletcher32"
        ));
        assert!(CodecChain::new(vec![fletcher32.clone(), fletcher32]).is_ok());
    }

    #[test]
    fn codec_chain_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let chain = CodecChain::new(vec![shuffle(), Arc::new(Fletcher32Codec::new())])?;
        let metadata = chain.create_metadata();
        assert_eq!(
            serde_json::to_string(&metadata)?,
            r#"[{"name":"shuffle","configuration":{"elementsize":4}},{"name":"fletcher32"}]"#
        );
        let chain = CodecChain::from_metadata(&metadata)?;
        assert_eq!(chain.names(), vec!["shuffle", "fletcher32"]);
        assert!(chain.has_checksum());
        Ok(())
    }

    #[test]
    fn codec_chain_encoded_representation() -> Result<(), Box<dyn std::error::Error>> {
        let chain = CodecChain::new(vec![shuffle(), Arc::new(Fletcher32Codec::new())])?;
        assert_eq!(
            chain.encoded_representation(&BytesRepresentation::FixedSize(256)),
            BytesRepresentation::FixedSize(260)
        );
        Ok(())
    }

    #[test]
    fn codec_chain_unexpected_size() -> Result<(), Box<dyn std::error::Error>> {
        let chain = CodecChain::new(vec![shuffle()])?;
        let bytes = bytes();
        let encoded = chain.encode(RawBytes::from(&bytes), &CodecOptions::default())?;
        assert!(matches!(
            chain.decode(
                encoded,
                &BytesRepresentation::FixedSize(128),
                &CodecOptions::default()
            ),
            Err(CodecError::UnexpectedDecodedSize {
                len: 256,
                expected: 128
            })
        ));
        Ok(())
    }
}
