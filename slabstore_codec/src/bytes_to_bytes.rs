//! Bytes to bytes codecs.

#[cfg(feature = "crc32c")]
pub mod crc32c;
pub mod fletcher32;
#[cfg(feature = "gzip")]
pub mod gzip;
#[cfg(feature = "lzf")]
pub mod lzf;
pub mod shuffle;
#[cfg(feature = "zlib")]
pub mod zlib;
#[cfg(feature = "zstd")]
pub mod zstd;

#[cfg(any(feature = "gzip", feature = "zlib"))]
mod deflate_level;
#[cfg(any(feature = "gzip", feature = "zlib"))]
pub use deflate_level::{DeflateCompressionLevel, DeflateCompressionLevelError};

/// The size of a 32-bit checksum in bytes.
const CHECKSUM_SIZE: usize = size_of::<u32>();

/// Split a trailing little-endian 32-bit checksum from `encoded_value`.
fn split_checksum<'a>(
    codec: &'static str,
    encoded_value: &'a [u8],
) -> Result<(&'a [u8], u32), crate::CodecError> {
    let Some(split) = encoded_value.len().checked_sub(CHECKSUM_SIZE) else {
        return Err(crate::CodecError::Other(format!(
            "{codec} decoder expects at least {CHECKSUM_SIZE} bytes, got {}",
            encoded_value.len()
        )));
    };
    let (payload, checksum) = encoded_value.split_at(split);
    let mut stored = [0; CHECKSUM_SIZE];
    stored.copy_from_slice(checksum);
    Ok((payload, u32::from_le_bytes(stored)))
}

/// Add the checksum size to a bytes representation.
fn checksum_representation(
    decoded_representation: &crate::BytesRepresentation,
) -> crate::BytesRepresentation {
    use crate::BytesRepresentation;
    match decoded_representation {
        BytesRepresentation::FixedSize(size) => {
            BytesRepresentation::FixedSize(size + CHECKSUM_SIZE as u64)
        }
        BytesRepresentation::BoundedSize(size) => {
            BytesRepresentation::BoundedSize(size + CHECKSUM_SIZE as u64)
        }
        BytesRepresentation::UnboundedSize => BytesRepresentation::UnboundedSize,
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, sync::Arc};

    use itertools::Itertools;

    use super::*;
    use crate::{BytesRepresentation, BytesToBytesCodecTraits, CodecChain, CodecOptions, RawBytes};

    fn stages() -> Vec<Arc<dyn BytesToBytesCodecTraits>> {
        let mut stages: Vec<Arc<dyn BytesToBytesCodecTraits>> = vec![Arc::new(
            shuffle::ShuffleCodec::new(NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN)),
        )];
        #[cfg(feature = "gzip")]
        stages.push(Arc::new(gzip::GzipCodec::new(6).unwrap()));
        #[cfg(feature = "zlib")]
        stages.push(Arc::new(zlib::ZlibCodec::new(1).unwrap()));
        #[cfg(feature = "zstd")]
        stages.push(Arc::new(zstd::ZstdCodec::new(3, false)));
        #[cfg(feature = "lzf")]
        stages.push(Arc::new(lzf::LzfCodec::new()));
        stages
    }

    fn checksums() -> Vec<Arc<dyn BytesToBytesCodecTraits>> {
        let mut checksums: Vec<Arc<dyn BytesToBytesCodecTraits>> =
            vec![Arc::new(fletcher32::Fletcher32Codec::new())];
        #[cfg(feature = "crc32c")]
        checksums.push(Arc::new(crc32c::Crc32cCodec::new()));
        checksums
    }

    #[test]
    fn codec_orderings_round_trip() {
        let bytes: Vec<u8> = (0..1024u64)
            .map(|i| (i / 7) * 3)
            .flat_map(u64::to_le_bytes)
            .collect();
        let representation = BytesRepresentation::FixedSize(bytes.len() as u64);
        let options = CodecOptions::default();

        let stages = stages();
        let checksums = checksums();
        for length in 0..=stages.len() {
            for ordering in stages.iter().cloned().permutations(length) {
                for checksum in std::iter::once(None).chain(checksums.iter().cloned().map(Some)) {
                    let mut codecs = ordering.clone();
                    codecs.extend(checksum);
                    let chain = CodecChain::new(codecs).unwrap();
                    let encoded = chain
                        .encode(RawBytes::from(&bytes), &options)
                        .unwrap()
                        .into_owned();
                    if let Some(bound) = chain.encoded_representation(&representation).size() {
                        assert!(encoded.len() as u64 <= bound, "{:?}", chain.names());
                    }
                    let decoded = chain
                        .decode(RawBytes::from(encoded), &representation, &options)
                        .unwrap();
                    assert_eq!(decoded.as_ref(), bytes.as_slice(), "{:?}", chain.names());
                }
            }
        }
    }

    #[test]
    fn split_checksum_short() {
        assert!(split_checksum("test", &[1, 2, 3]).is_err());
        assert_eq!(
            split_checksum("test", &[9, 1, 0, 0, 0]).unwrap(),
            (&[9u8][..], 1)
        );
    }
}
