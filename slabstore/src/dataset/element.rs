use std::borrow::Cow;

use super::{DataType, DatasetError, NumericKind};

/// A trait representing a numeric dataset element.
///
/// Elements are converted to and from the byte order of the dataset [`DataType`].
pub trait Element: bytemuck::Pod + Send + Sync {
    /// The kind of the element.
    const KIND: NumericKind;

    /// Reverse the byte order of the element.
    #[must_use]
    fn swap_bytes(self) -> Self;

    /// Validate the data type.
    ///
    /// # Errors
    /// Returns [`DatasetError::IncompatibleElementType`] if the kind or size of the data type does not match the element.
    fn validate_data_type(data_type: &DataType) -> Result<(), DatasetError> {
        if data_type.kind() == Self::KIND && data_type.size() == size_of::<Self>() {
            Ok(())
        } else {
            Err(DatasetError::IncompatibleElementType(*data_type))
        }
    }

    /// Convert a slice of elements into bytes of `data_type`.
    ///
    /// # Errors
    /// Returns [`DatasetError::IncompatibleElementType`] if the data type is incompatible with the element.
    fn to_bytes<'a>(data_type: &DataType, elements: &'a [Self]) -> Result<Cow<'a, [u8]>, DatasetError> {
        Self::validate_data_type(data_type)?;
        if data_type.endianness().is_native() {
            Ok(Cow::Borrowed(bytemuck::cast_slice(elements)))
        } else {
            let swapped: Vec<Self> = elements.iter().map(|element| element.swap_bytes()).collect();
            Ok(Cow::Owned(bytemuck::cast_slice(&swapped).to_vec()))
        }
    }

    /// Convert bytes of `data_type` into elements.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the data type is incompatible with the element or the length of `bytes` is not a multiple of the element size.
    fn from_bytes(data_type: &DataType, bytes: &[u8]) -> Result<Vec<Self>, DatasetError> {
        Self::validate_data_type(data_type)?;
        if bytes.len() % size_of::<Self>() != 0 {
            return Err(DatasetError::SizeMismatch {
                len: bytes.len(),
                expected: (bytes.len() / size_of::<Self>() * size_of::<Self>()) as u64,
            });
        }
        let mut elements: Vec<Self> = bytemuck::pod_collect_to_vec(bytes);
        if !data_type.endianness().is_native() {
            elements
                .iter_mut()
                .for_each(|element| *element = element.swap_bytes());
        }
        Ok(elements)
    }
}

macro_rules! impl_element_int {
    ($raw_type:ty, $kind:expr) => {
        impl Element for $raw_type {
            const KIND: NumericKind = $kind;

            fn swap_bytes(self) -> Self {
                <$raw_type>::swap_bytes(self)
            }
        }
    };
}

macro_rules! impl_element_float {
    ($raw_type:ty) => {
        impl Element for $raw_type {
            const KIND: NumericKind = NumericKind::Float;

            fn swap_bytes(self) -> Self {
                <$raw_type>::from_bits(self.to_bits().swap_bytes())
            }
        }
    };
}

impl_element_int!(i8, NumericKind::Signed);
impl_element_int!(i16, NumericKind::Signed);
impl_element_int!(i32, NumericKind::Signed);
impl_element_int!(i64, NumericKind::Signed);
impl_element_int!(u8, NumericKind::Unsigned);
impl_element_int!(u16, NumericKind::Unsigned);
impl_element_int!(u32, NumericKind::Unsigned);
impl_element_int!(u64, NumericKind::Unsigned);
impl_element_float!(f32);
impl_element_float!(f64);
