//! Dataspaces.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ArrayShape, IncompatibleDimensionalityError, Selection};

/// The maximum extent of a dimension.
///
/// Serialised as an integer, or `null` if unlimited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxExtent {
    /// The dimension may grow up to and including this size.
    Bounded(u64),
    /// The dimension may grow without limit.
    Unlimited,
}

impl MaxExtent {
    /// Returns true if a dimension of `size` is within the maximum extent.
    #[must_use]
    pub fn admits(&self, size: u64) -> bool {
        match self {
            Self::Bounded(max) => size <= *max,
            Self::Unlimited => true,
        }
    }
}

impl Display for MaxExtent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounded(max) => write!(f, "{max}"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

impl From<u64> for MaxExtent {
    fn from(max: u64) -> Self {
        Self::Bounded(max)
    }
}

/// A dataspace error.
#[derive(Clone, Debug, Error)]
pub enum DataspaceError {
    /// The dimensionality of the shapes do not match.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// A dimension exceeds its maximum extent.
    #[error("dimension {dim} of size {size} exceeds its maximum extent {max}")]
    ExceedsMaxExtent {
        /// The dimension.
        dim: usize,
        /// The requested size.
        size: u64,
        /// The maximum extent.
        max: MaxExtent,
    },
    /// A dimension would shrink.
    #[error("dimension {dim} cannot shrink from {current} to {size}")]
    Shrink {
        /// The dimension.
        dim: usize,
        /// The requested size.
        size: u64,
        /// The current size.
        current: u64,
    },
}

/// The current and maximum extents of an n-dimensional array.
///
/// The rank is fixed at creation and every dimension is within its maximum extent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataspace {
    shape: ArrayShape,
    max_shape: Vec<MaxExtent>,
}

impl Dataspace {
    /// Create a new dataspace.
    ///
    /// # Errors
    /// Returns a [`DataspaceError`] if `shape` and `max_shape` differ in dimensionality or a dimension of `shape` exceeds its maximum extent.
    pub fn new(shape: ArrayShape, max_shape: Vec<MaxExtent>) -> Result<Self, DataspaceError> {
        if shape.len() != max_shape.len() {
            return Err(IncompatibleDimensionalityError::new(max_shape.len(), shape.len()).into());
        }
        for (dim, (&size, max)) in std::iter::zip(&shape, &max_shape).enumerate() {
            if !max.admits(size) {
                return Err(DataspaceError::ExceedsMaxExtent {
                    dim,
                    size,
                    max: *max,
                });
            }
        }
        Ok(Self { shape, max_shape })
    }

    /// Create a new dataspace that cannot grow.
    #[must_use]
    pub fn new_fixed(shape: ArrayShape) -> Self {
        let max_shape = shape.iter().copied().map(MaxExtent::Bounded).collect();
        Self { shape, max_shape }
    }

    /// The rank (dimensionality) of the dataspace.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// The current extent.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The maximum extent.
    #[must_use]
    pub fn max_shape(&self) -> &[MaxExtent] {
        &self.max_shape
    }

    /// The number of elements within the current extent.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns true if any dimension can grow.
    #[must_use]
    pub fn is_growable(&self) -> bool {
        std::iter::zip(&self.shape, &self.max_shape).any(|(&size, max)| match max {
            MaxExtent::Bounded(max) => *max > size,
            MaxExtent::Unlimited => true,
        })
    }

    /// A selection of every element within the current extent.
    #[must_use]
    pub fn select_all(&self) -> Selection {
        Selection::new_all(self.shape.clone())
    }

    /// An empty selection over the current extent.
    #[must_use]
    pub fn select_none(&self) -> Selection {
        Selection::new_none(self.shape.clone())
    }

    /// Change the current extent to `shape`.
    ///
    /// # Errors
    /// Returns a [`DataspaceError`] if the dimensionality differs, a dimension exceeds its maximum extent, or a dimension would shrink.
    pub fn resize(&mut self, shape: &[u64]) -> Result<(), DataspaceError> {
        if shape.len() != self.rank() {
            return Err(IncompatibleDimensionalityError::new(shape.len(), self.rank()).into());
        }
        for (dim, ((&size, &current), max)) in std::iter::zip(shape, &self.shape)
            .zip(&self.max_shape)
            .enumerate()
        {
            if !max.admits(size) {
                return Err(DataspaceError::ExceedsMaxExtent {
                    dim,
                    size,
                    max: *max,
                });
            }
            if size < current {
                return Err(DataspaceError::Shrink { dim, size, current });
            }
        }
        self.shape = shape.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataspace_new() {
        assert!(Dataspace::new(vec![4, 7], vec![MaxExtent::Bounded(6), MaxExtent::Unlimited]).is_ok());
        assert!(matches!(
            Dataspace::new(vec![4, 7], vec![MaxExtent::Bounded(6)]),
            Err(DataspaceError::IncompatibleDimensionality(_))
        ));
        assert!(matches!(
            Dataspace::new(vec![4, 7], vec![MaxExtent::Bounded(3), MaxExtent::Bounded(7)]),
            Err(DataspaceError::ExceedsMaxExtent { dim: 0, size: 4, .. })
        ));
        let fixed = Dataspace::new_fixed(vec![2, 3]);
        assert!(!fixed.is_growable());
        assert_eq!(fixed.num_elements(), 6);
        assert_eq!(fixed.select_all().num_elements(), 6);
    }

    #[test]
    fn dataspace_resize() -> Result<(), DataspaceError> {
        let mut dataspace = Dataspace::new(vec![4, 7], vec![MaxExtent::Bounded(6), MaxExtent::Unlimited])?;
        assert!(dataspace.is_growable());
        dataspace.resize(&[6, 10])?;
        assert_eq!(dataspace.shape(), &[6, 10]);
        dataspace.resize(&[6, 1000])?;
        assert!(matches!(
            dataspace.resize(&[7, 1000]),
            Err(DataspaceError::ExceedsMaxExtent { dim: 0, size: 7, max: MaxExtent::Bounded(6) })
        ));
        assert!(matches!(
            dataspace.resize(&[6, 999]),
            Err(DataspaceError::Shrink { dim: 1, size: 999, current: 1000 })
        ));
        assert_eq!(dataspace.shape(), &[6, 1000]);
        Ok(())
    }

    #[test]
    fn dataspace_serde() -> Result<(), Box<dyn std::error::Error>> {
        let dataspace = Dataspace::new(vec![4, 7], vec![MaxExtent::Bounded(6), MaxExtent::Unlimited])?;
        let json = serde_json::to_string(&dataspace)?;
        assert_eq!(json, r#"{"shape":[4,7],"max_shape":[6,null]}"#);
        assert_eq!(serde_json::from_str::<Dataspace>(&json)?, dataspace);
        Ok(())
    }
}
