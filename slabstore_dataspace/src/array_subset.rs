//! Array subsets.
//!
//! An [`ArraySubset`] is an axis-aligned box of an array or chunk.

use std::{fmt::Display, ops::Range};

use serde::{Deserialize, Serialize};

use crate::{
    ArrayIndices, ArrayShape, IncompatibleDimensionalityError, iterators::Indices,
};

/// An array subset.
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct ArraySubset {
    /// The start of the array subset.
    pub(crate) start: ArrayIndices,
    /// The shape of the array subset.
    pub(crate) shape: ArrayShape,
}

impl Display for ArraySubset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.to_ranges())
    }
}

impl<T: IntoIterator<Item = Range<u64>>> From<T> for ArraySubset {
    fn from(ranges: T) -> Self {
        let (start, shape) = ranges
            .into_iter()
            .map(|range| (range.start, range.end.saturating_sub(range.start)))
            .unzip();
        Self { start, shape }
    }
}

impl ArraySubset {
    /// Create a new empty array subset.
    #[must_use]
    pub fn new_empty(dimensionality: usize) -> Self {
        Self {
            start: vec![0; dimensionality],
            shape: vec![0; dimensionality],
        }
    }

    /// Create a new array subset from a list of [`Range`]s.
    #[must_use]
    pub fn new_with_ranges(ranges: &[Range<u64>]) -> Self {
        ranges.iter().cloned().into()
    }

    /// Create a new array subset with `shape` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the lengths of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: ArrayIndices,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(
                shape.len(),
                start.len(),
            ))
        }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the array subset as a list of ranges.
    #[must_use]
    pub fn to_ranges(&self) -> Vec<Range<u64>> {
        std::iter::zip(&self.start, &self.shape)
            .map(|(&start, &size)| start..start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns true if the array subset contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.contains(&0)
    }

    /// Returns true if the array subset contains `indices`.
    #[must_use]
    pub fn contains(&self, indices: &[u64]) -> bool {
        indices.len() == self.dimensionality()
            && itertools::izip!(indices, &self.start, &self.shape)
                .all(|(&i, &start, &size)| i >= start && i < start + size)
    }

    /// Returns true if the array subset lies within an array of `shape`.
    #[must_use]
    pub fn inbounds_shape(&self, shape: &[u64]) -> bool {
        shape.len() == self.dimensionality()
            && itertools::izip!(&self.start, &self.shape, shape)
                .all(|(&start, &size, &extent)| start + size <= extent)
    }

    /// Return the intersection of this array subset with `other`, or [`None`] if they do not overlap.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let mut start = Vec::with_capacity(self.dimensionality());
        let mut shape = Vec::with_capacity(self.dimensionality());
        for (a, b) in std::iter::zip(self.to_ranges(), other.to_ranges()) {
            let lo = a.start.max(b.start);
            let hi = a.end.min(b.end);
            if lo >= hi {
                return None;
            }
            start.push(lo);
            shape.push(hi - lo);
        }
        Some(Self { start, shape })
    }

    /// Returns true if this array subset shares at least one element with `other`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        std::iter::zip(self.to_ranges(), other.to_ranges())
            .all(|(a, b)| a.start.max(b.start) < a.end.min(b.end))
    }

    /// Return the elements of this array subset not in `other` as disjoint array subsets.
    ///
    /// At most two subsets are produced per dimension: the slabs below and above `other` in that dimension,
    /// restricted to the overlap of `other` in all preceding dimensions.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Vec<Self> {
        let Some(intersection) = self.intersect(other) else {
            return vec![self.clone()];
        };
        let mut pieces = Vec::new();
        let mut remainder = self.clone();
        for dim in 0..self.dimensionality() {
            let (start, end) = (remainder.start[dim], remainder.start[dim] + remainder.shape[dim]);
            let (cut_start, cut_end) = (
                intersection.start[dim],
                intersection.start[dim] + intersection.shape[dim],
            );
            if start < cut_start {
                let mut below = remainder.clone();
                below.shape[dim] = cut_start - start;
                pieces.push(below);
            }
            if cut_end < end {
                let mut above = remainder.clone();
                above.start[dim] = cut_end;
                above.shape[dim] = end - cut_end;
                pieces.push(above);
            }
            remainder.start[dim] = cut_start;
            remainder.shape[dim] = cut_end - cut_start;
        }
        pieces
    }

    /// Return the array subset relative to `offset`.
    ///
    /// # Panics
    /// Panics if `offset` exceeds the start of the array subset in any dimension.
    #[must_use]
    pub fn relative_to(&self, offset: &[u64]) -> Self {
        Self {
            start: std::iter::zip(&self.start, offset)
                .map(|(start, offset)| start - offset)
                .collect(),
            shape: self.shape.clone(),
        }
    }

    /// Return an iterator over the indices of elements of the array subset in row-major order.
    #[must_use]
    pub fn indices(&self) -> Indices {
        Indices::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn elements(subsets: &[ArraySubset]) -> BTreeSet<ArrayIndices> {
        subsets.iter().flat_map(ArraySubset::indices).collect()
    }

    #[test]
    fn array_subset() {
        let subset = ArraySubset::new_with_ranges(&[1..3, 2..6]);
        assert_eq!(subset.start(), &[1, 2]);
        assert_eq!(subset.shape(), &[2, 4]);
        assert_eq!(subset.end_exc(), vec![3, 6]);
        assert_eq!(subset.num_elements(), 8);
        assert_eq!(subset.to_string(), "[1..3, 2..6]");
        assert!(subset.contains(&[2, 5]));
        assert!(!subset.contains(&[3, 5]));
        assert!(subset.inbounds_shape(&[3, 6]));
        assert!(!subset.inbounds_shape(&[3, 5]));
        assert!(ArraySubset::new_with_start_shape(vec![0], vec![1, 2]).is_err());
        assert!(ArraySubset::new_empty(2).is_empty());
        assert_eq!(subset.relative_to(&[1, 2]), ArraySubset::new_with_ranges(&[0..2, 0..4]));
    }

    #[test]
    fn array_subset_intersect() {
        let a = ArraySubset::new_with_ranges(&[0..4, 0..4]);
        let b = ArraySubset::new_with_ranges(&[2..6, 3..8]);
        assert_eq!(
            a.intersect(&b),
            Some(ArraySubset::new_with_ranges(&[2..4, 3..4]))
        );
        assert!(a.overlaps(&b));
        let c = ArraySubset::new_with_ranges(&[4..6, 0..4]);
        assert_eq!(a.intersect(&c), None);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn array_subset_subtract() {
        let a = ArraySubset::new_with_ranges(&[0..5, 0..6, 1..3]);
        let b = ArraySubset::new_with_ranges(&[1..3, 2..9, 0..2]);
        let pieces = a.subtract(&b);
        assert!(pieces.len() <= 6);
        for (i, p) in pieces.iter().enumerate() {
            for q in &pieces[i + 1..] {
                assert!(!p.overlaps(q));
            }
        }
        let expected: BTreeSet<ArrayIndices> = a.indices().filter(|i| !b.contains(i)).collect();
        assert_eq!(elements(&pieces), expected);

        assert_eq!(a.subtract(&a), vec![]);
        let disjoint = ArraySubset::new_with_ranges(&[10..11, 0..1, 0..1]);
        assert_eq!(a.subtract(&disjoint), vec![a]);
    }
}
