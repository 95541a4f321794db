//! Numeric data types.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of a numeric element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    /// A two's complement signed integer.
    #[display("int")]
    Signed,
    /// An unsigned integer.
    #[display("uint")]
    Unsigned,
    /// An IEEE 754 floating point number.
    #[display("float")]
    Float,
}

/// The byte order of an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Little endian.
    #[display("le")]
    Little,
    /// Big endian.
    #[display("be")]
    Big,
}

impl Endianness {
    /// The native byte order of the target.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Self::Little;

    /// The native byte order of the target.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Self::Big;

    /// Returns true if this is the native byte order of the target.
    #[must_use]
    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }
}

/// An unsupported data type error.
#[derive(Clone, Copy, Debug, Error)]
#[error("{kind} elements of {size} bytes are not supported")]
pub struct UnsupportedDataTypeError {
    kind: NumericKind,
    size: usize,
}

/// A fixed-size numeric data type.
///
/// Integers are 1, 2, 4, or 8 bytes and floats are 4 or 8 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    kind: NumericKind,
    size: usize,
    endianness: Endianness,
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.kind, self.size * 8, self.endianness)
    }
}

impl DataType {
    /// `int8` in native byte order.
    pub const INT8: Self = Self::native(NumericKind::Signed, 1);
    /// `int16` in native byte order.
    pub const INT16: Self = Self::native(NumericKind::Signed, 2);
    /// `int32` in native byte order.
    pub const INT32: Self = Self::native(NumericKind::Signed, 4);
    /// `int64` in native byte order.
    pub const INT64: Self = Self::native(NumericKind::Signed, 8);
    /// `uint8` in native byte order.
    pub const UINT8: Self = Self::native(NumericKind::Unsigned, 1);
    /// `uint16` in native byte order.
    pub const UINT16: Self = Self::native(NumericKind::Unsigned, 2);
    /// `uint32` in native byte order.
    pub const UINT32: Self = Self::native(NumericKind::Unsigned, 4);
    /// `uint64` in native byte order.
    pub const UINT64: Self = Self::native(NumericKind::Unsigned, 8);
    /// `float32` in native byte order.
    pub const FLOAT32: Self = Self::native(NumericKind::Float, 4);
    /// `float64` in native byte order.
    pub const FLOAT64: Self = Self::native(NumericKind::Float, 8);

    const fn native(kind: NumericKind, size: usize) -> Self {
        Self {
            kind,
            size,
            endianness: Endianness::NATIVE,
        }
    }

    /// Create a new data type.
    ///
    /// # Errors
    /// Returns an [`UnsupportedDataTypeError`] if `size` is not supported for `kind`.
    pub fn new(
        kind: NumericKind,
        size: usize,
        endianness: Endianness,
    ) -> Result<Self, UnsupportedDataTypeError> {
        let supported = match kind {
            NumericKind::Signed | NumericKind::Unsigned => matches!(size, 1 | 2 | 4 | 8),
            NumericKind::Float => matches!(size, 4 | 8),
        };
        if supported {
            Ok(Self {
                kind,
                size,
                endianness,
            })
        } else {
            Err(UnsupportedDataTypeError { kind, size })
        }
    }

    /// Return the data type with byte order `endianness`.
    #[must_use]
    pub const fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// The kind of element.
    #[must_use]
    pub const fn kind(&self) -> NumericKind {
        self.kind
    }

    /// The size of an element in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The byte order of an element.
    #[must_use]
    pub const fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Check that a deserialised data type is supported.
    ///
    /// # Errors
    /// Returns an [`UnsupportedDataTypeError`] if the size is not supported for the kind.
    pub fn validate(&self) -> Result<(), UnsupportedDataTypeError> {
        Self::new(self.kind, self.size, self.endianness).map(|_| ())
    }
}
