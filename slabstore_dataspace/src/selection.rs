//! Hyperslab selections.

use itertools::{Itertools, izip};
use serde::{Deserialize, Serialize};

use crate::{
    ArrayIndices, ArrayShape, ArraySubset, Hyperslab, IncompatibleDimensionalityError, SelectionError,
    iterators::{SelectionIndices, SelectionRuns},
};

/// How a hyperslab is combined with an existing selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum SelectionOperator {
    /// Replace the selection with the hyperslab.
    Set,
    /// Add the hyperslab to the selection (union).
    Or,
    /// Keep only the elements in both the selection and the hyperslab.
    And,
    /// Keep the elements in either the selection or the hyperslab, but not both.
    Xor,
    /// Remove the elements of the hyperslab from the selection.
    NotB,
    /// Keep the elements of the hyperslab that are not in the selection.
    NotA,
}

/// A set of elements of an array.
///
/// A selection is held as disjoint, non-empty [`ArraySubset`]s.
/// Combining operators compute exact elementwise set operations, so a selection can describe arbitrarily interleaved patterns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    shape: ArrayShape,
    boxes: Vec<ArraySubset>,
}

impl Selection {
    /// Create an empty selection over an array of `shape`.
    #[must_use]
    pub fn new_none(shape: ArrayShape) -> Self {
        Self {
            shape,
            boxes: vec![],
        }
    }

    /// Create a selection of every element of an array of `shape`.
    #[must_use]
    pub fn new_all(shape: ArrayShape) -> Self {
        let mut selection = Self::new_none(shape);
        selection.select_all();
        selection
    }

    /// Create a selection of `subset` over an array of `shape`.
    ///
    /// # Errors
    /// Returns a [`SelectionError`] if `subset` is not within `shape`.
    pub fn new_with_subset(shape: ArrayShape, subset: &ArraySubset) -> Result<Self, SelectionError> {
        Self::new_none(shape).with_hyperslab(SelectionOperator::Set, &Hyperslab::from(subset))
    }

    /// The shape of the array the selection is over.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The dimensionality of the selection.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape.len()
    }

    /// The disjoint boxes making up the selection, sorted by start.
    #[must_use]
    pub fn boxes(&self) -> &[ArraySubset] {
        &self.boxes
    }

    /// The number of selected elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.boxes.iter().map(ArraySubset::num_elements).sum()
    }

    /// Returns true if no elements are selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Returns true if the element at `indices` is selected.
    #[must_use]
    pub fn contains(&self, indices: &[u64]) -> bool {
        self.boxes.iter().any(|subset| subset.contains(indices))
    }

    /// The smallest array subset containing every selected element, or [`None`] if the selection is empty.
    #[must_use]
    pub fn bounding_box(&self) -> Option<ArraySubset> {
        let (first, rest) = self.boxes.split_first()?;
        let (start, end) = rest.iter().fold(
            (first.start().to_vec(), first.end_exc()),
            |(mut start, mut end), subset| {
                for (start, end, subset_start, subset_end) in
                    izip!(&mut start, &mut end, subset.start(), subset.end_exc())
                {
                    *start = (*start).min(*subset_start);
                    *end = (*end).max(subset_end);
                }
                (start, end)
            },
        );
        Some(std::iter::zip(start, end).map(|(start, end)| start..end).into())
    }

    /// Select every element.
    pub fn select_all(&mut self) {
        let all = ArraySubset::new_with_shape(self.shape.clone());
        self.boxes = if all.is_empty() { vec![] } else { vec![all] };
    }

    /// Deselect every element.
    pub fn select_none(&mut self) {
        self.boxes.clear();
    }

    /// Combine `hyperslab` with the selection.
    ///
    /// # Errors
    /// Returns a [`SelectionError`] if the dimensionality of `hyperslab` does not match the selection or any of its blocks extend past the shape of the selection.
    pub fn select_hyperslab(
        &mut self,
        operator: SelectionOperator,
        hyperslab: &Hyperslab,
    ) -> Result<(), SelectionError> {
        if hyperslab.dimensionality() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                hyperslab.dimensionality(),
                self.dimensionality(),
            )
            .into());
        }
        let bounding_box = hyperslab.bounding_box();
        if !hyperslab.is_empty() && !bounding_box.inbounds_shape(&self.shape) {
            return Err(SelectionError::OutOfBounds {
                subset: bounding_box,
                extent: self.shape.clone(),
            });
        }

        self.combine(operator, hyperslab.blocks());
        Ok(())
    }

    /// Combine the single elements at `points` with the selection.
    ///
    /// The points are combined as a set: duplicates select an element once, and the selection is traversed in row-major order regardless of the order of `points`.
    ///
    /// # Errors
    /// Returns a [`SelectionError`] if the dimensionality of a point does not match the selection or a point lies outside the shape of the selection.
    pub fn select_elements(
        &mut self,
        operator: SelectionOperator,
        points: &[ArrayIndices],
    ) -> Result<(), SelectionError> {
        let mut elements = Vec::with_capacity(points.len());
        for point in points {
            if point.len() != self.dimensionality() {
                return Err(
                    IncompatibleDimensionalityError::new(point.len(), self.dimensionality()).into(),
                );
            }
            let element = ArraySubset::new_with_start_shape(point.clone(), vec![1; point.len()])?;
            if !element.inbounds_shape(&self.shape) {
                return Err(SelectionError::OutOfBounds {
                    subset: element,
                    extent: self.shape.clone(),
                });
            }
            elements.push(element);
        }
        elements.sort_unstable();
        elements.dedup();
        self.combine(operator, elements);
        Ok(())
    }

    /// Combine the single elements at `points` with the selection and return it.
    ///
    /// # Errors
    /// See [`select_elements`](Selection::select_elements).
    pub fn with_elements(
        mut self,
        operator: SelectionOperator,
        points: &[ArrayIndices],
    ) -> Result<Self, SelectionError> {
        self.select_elements(operator, points)?;
        Ok(self)
    }

    /// Combine the disjoint boxes `other` with the selection.
    fn combine(&mut self, operator: SelectionOperator, other: Vec<ArraySubset>) {
        let selected = std::mem::take(&mut self.boxes);
        let combined = match operator {
            SelectionOperator::Set => other,
            SelectionOperator::Or => {
                let added = subtract_all(&other, &selected);
                selected.into_iter().chain(added).collect()
            }
            SelectionOperator::And => intersect_all(&selected, &other),
            SelectionOperator::Xor => {
                let mut combined = subtract_all(&selected, &other);
                combined.extend(subtract_all(&other, &selected));
                combined
            }
            SelectionOperator::NotB => subtract_all(&selected, &other),
            SelectionOperator::NotA => subtract_all(&other, &selected),
        };
        self.boxes = coalesce(combined, self.dimensionality());
    }

    /// Combine `hyperslab` with the selection and return it.
    ///
    /// # Errors
    /// See [`select_hyperslab`](Selection::select_hyperslab).
    pub fn with_hyperslab(
        mut self,
        operator: SelectionOperator,
        hyperslab: &Hyperslab,
    ) -> Result<Self, SelectionError> {
        self.select_hyperslab(operator, hyperslab)?;
        Ok(self)
    }

    /// Check that every selected element lies within `extent`.
    ///
    /// # Errors
    /// Returns a [`SelectionError`] if the dimensionality of `extent` does not match or a selected element is outside of it.
    pub fn validate(&self, extent: &[u64]) -> Result<(), SelectionError> {
        if extent.len() != self.dimensionality() {
            return Err(
                IncompatibleDimensionalityError::new(extent.len(), self.dimensionality()).into(),
            );
        }
        if let Some(subset) = self
            .boxes
            .iter()
            .find(|subset| !subset.inbounds_shape(extent))
        {
            return Err(SelectionError::OutOfBounds {
                subset: subset.clone(),
                extent: extent.to_vec(),
            });
        }
        Ok(())
    }

    /// Return a lazy iterator over the runs of selected elements in C order.
    #[must_use]
    pub fn runs(&self) -> SelectionRuns {
        SelectionRuns::new(self.boxes.clone().into(), self.dimensionality())
    }

    /// Return a lazy iterator over the indices of selected elements in C order.
    #[must_use]
    pub fn indices(&self) -> SelectionIndices {
        SelectionIndices::new(self.runs())
    }

    /// Resolve the selection against the current `extent` into the indices of selected elements in C order.
    ///
    /// # Errors
    /// Returns a [`SelectionError`] if any selected element lies outside `extent`.
    pub fn resolve(&self, extent: &[u64]) -> Result<SelectionIndices, SelectionError> {
        self.validate(extent)?;
        Ok(self.indices())
    }
}

/// Disjoint boxes sorted by their start in the first dimension, for finding the boxes that overlap a subset.
struct SortedBoxes<'a> {
    boxes: Vec<&'a ArraySubset>,
    max_len: u64,
}

impl<'a> SortedBoxes<'a> {
    fn new(boxes: &'a [ArraySubset]) -> Self {
        let mut boxes: Vec<&ArraySubset> = boxes.iter().filter(|subset| !subset.is_empty()).collect();
        boxes.sort_unstable_by_key(|subset| first_dim(subset.start()));
        let max_len = boxes
            .iter()
            .map(|subset| first_dim(subset.shape()))
            .max()
            .unwrap_or_default();
        Self { boxes, max_len }
    }

    /// The boxes overlapping `subset`.
    fn overlapping(&self, subset: &ArraySubset) -> Vec<&'a ArraySubset> {
        let candidates = if subset.dimensionality() == 0 {
            &self.boxes[..]
        } else {
            let (start, len) = (first_dim(subset.start()), first_dim(subset.shape()));
            let lower = self
                .boxes
                .partition_point(|other| first_dim(other.start()) + self.max_len <= start);
            let upper = self
                .boxes
                .partition_point(|other| first_dim(other.start()) < start + len);
            &self.boxes[lower..upper.max(lower)]
        };
        candidates
            .iter()
            .copied()
            .filter(|other| other.overlaps(subset))
            .collect()
    }
}

fn first_dim(values: &[u64]) -> u64 {
    values.first().copied().unwrap_or_default()
}

/// Remove the elements of `cuts` from `boxes`.
///
/// Each box is split only by the cuts that overlap it, and each piece only by the remaining cuts that overlap the piece.
fn subtract_all(boxes: &[ArraySubset], cuts: &[ArraySubset]) -> Vec<ArraySubset> {
    let cuts = SortedBoxes::new(cuts);
    let mut remaining = Vec::with_capacity(boxes.len());
    let mut pending: Vec<(ArraySubset, Vec<&ArraySubset>)> = boxes
        .iter()
        .map(|subset| (subset.clone(), cuts.overlapping(subset)))
        .collect();
    while let Some((subset, candidates)) = pending.pop() {
        let overlapping: Vec<&ArraySubset> = candidates
            .into_iter()
            .filter(|cut| cut.overlaps(&subset))
            .collect();
        if let Some((cut, rest)) = overlapping.split_first() {
            pending.extend(
                subset
                    .subtract(cut)
                    .into_iter()
                    .map(|piece| (piece, rest.to_vec())),
            );
        } else {
            remaining.push(subset);
        }
    }
    remaining
}

/// The elementwise intersection of two sets of disjoint boxes.
fn intersect_all(a: &[ArraySubset], b: &[ArraySubset]) -> Vec<ArraySubset> {
    let b = SortedBoxes::new(b);
    a.iter()
        .flat_map(|subset| {
            b.overlapping(subset)
                .into_iter()
                .filter_map(|other| subset.intersect(other))
        })
        .collect()
}

fn other_dims(subset: &ArraySubset, dim: usize) -> impl Iterator<Item = (u64, u64)> + '_ {
    izip!(subset.start(), subset.shape())
        .enumerate()
        .filter(move |(d, _)| *d != dim)
        .map(|(_, (&start, &size))| (start, size))
}

/// Merge boxes that are adjacent in one dimension and identical in all others.
fn coalesce(mut boxes: Vec<ArraySubset>, dimensionality: usize) -> Vec<ArraySubset> {
    for dim in 0..dimensionality {
        boxes.sort_by(|a, b| {
            other_dims(a, dim)
                .cmp(other_dims(b, dim))
                .then(a.start[dim].cmp(&b.start[dim]))
        });
        boxes = boxes
            .into_iter()
            .coalesce(|mut a, b| {
                if a.start[dim] + a.shape[dim] == b.start[dim]
                    && other_dims(&a, dim).eq(other_dims(&b, dim))
                {
                    a.shape[dim] += b.shape[dim];
                    Ok(a)
                } else {
                    Err((a, b))
                }
            })
            .collect();
    }
    boxes.sort_unstable();
    boxes
}
