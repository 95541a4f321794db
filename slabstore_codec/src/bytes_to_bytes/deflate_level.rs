use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A deflate compression level, an integer from 0 (no compression) to 9 (best compression).
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug, Display)]
#[serde(try_from = "u32", into = "u32")]
pub struct DeflateCompressionLevel(u32);

/// An invalid deflate compression level.
#[derive(Debug, Error)]
#[error("invalid deflate compression level {0}, must be 0-9")]
pub struct DeflateCompressionLevelError(u32);

impl DeflateCompressionLevel {
    /// Create a new compression level.
    ///
    /// # Errors
    /// Returns [`DeflateCompressionLevelError`] if `level` is greater than 9.
    pub fn new(level: u32) -> Result<Self, DeflateCompressionLevelError> {
        if level <= 9 {
            Ok(Self(level))
        } else {
            Err(DeflateCompressionLevelError(level))
        }
    }

    /// The compression level as a [`u32`].
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for DeflateCompressionLevel {
    type Error = DeflateCompressionLevelError;

    fn try_from(level: u32) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<DeflateCompressionLevel> for u32 {
    fn from(level: DeflateCompressionLevel) -> Self {
        level.0
    }
}

impl From<DeflateCompressionLevel> for flate2::Compression {
    fn from(level: DeflateCompressionLevel) -> Self {
        Self::new(level.0)
    }
}
