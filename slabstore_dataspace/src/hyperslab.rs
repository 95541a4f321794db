use std::fmt::Display;

use itertools::{Itertools, izip};
use serde::{Deserialize, Serialize};

use crate::{ArrayIndices, ArraySubset, IncompatibleDimensionalityError, SelectionError};

/// A regularly strided block selection.
///
/// In each dimension, `count` blocks of `block` elements are selected, with the first block at `start` and each subsequent block `stride` elements after the previous one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hyperslab {
    start: ArrayIndices,
    stride: Vec<u64>,
    count: Vec<u64>,
    block: Vec<u64>,
}

impl Display for Hyperslab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "start {:?} stride {:?} count {:?} block {:?}",
            self.start, self.stride, self.count, self.block
        )
    }
}

impl From<&ArraySubset> for Hyperslab {
    fn from(subset: &ArraySubset) -> Self {
        let dimensionality = subset.dimensionality();
        Self {
            start: subset.start().to_vec(),
            stride: vec![1; dimensionality],
            count: vec![1; dimensionality],
            block: subset.shape().to_vec(),
        }
    }
}

impl Hyperslab {
    /// Create a new hyperslab.
    ///
    /// # Errors
    /// Returns a [`SelectionError`] if
    ///  - the parameters have different dimensionalities,
    ///  - `count > 1` and `stride` is zero, or
    ///  - `count > 1` and `stride < block` (the blocks would overlap).
    pub fn new(
        start: ArrayIndices,
        stride: Vec<u64>,
        count: Vec<u64>,
        block: Vec<u64>,
    ) -> Result<Self, SelectionError> {
        let dimensionality = start.len();
        for len in [stride.len(), count.len(), block.len()] {
            if len != dimensionality {
                return Err(IncompatibleDimensionalityError::new(len, dimensionality).into());
            }
        }
        let hyperslab = Self {
            start,
            stride,
            count,
            block,
        };
        for (&stride, &count, &block) in izip!(&hyperslab.stride, &hyperslab.count, &hyperslab.block)
        {
            if count > 1 && stride == 0 {
                return Err(SelectionError::InvalidHyperslab(
                    hyperslab,
                    "stride must be non-zero when count > 1".to_string(),
                ));
            }
            if count > 1 && stride < block {
                return Err(SelectionError::InvalidHyperslab(
                    hyperslab,
                    "blocks overlap (stride < block)".to_string(),
                ));
            }
        }
        Ok(hyperslab)
    }

    /// The start of the first block.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// The distance between the starts of consecutive blocks.
    #[must_use]
    pub fn stride(&self) -> &[u64] {
        &self.stride
    }

    /// The number of blocks.
    #[must_use]
    pub fn count(&self) -> &[u64] {
        &self.count
    }

    /// The shape of each block.
    #[must_use]
    pub fn block(&self) -> &[u64] {
        &self.block
    }

    /// The dimensionality of the hyperslab.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Returns true if the hyperslab selects no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        izip!(&self.count, &self.block).any(|(&count, &block)| count == 0 || block == 0)
    }

    /// The number of selected elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        izip!(&self.count, &self.block)
            .map(|(count, block)| count * block)
            .product()
    }

    /// The smallest array subset containing every selected element.
    #[must_use]
    pub fn bounding_box(&self) -> ArraySubset {
        if self.is_empty() {
            return ArraySubset::new_empty(self.dimensionality());
        }
        izip!(&self.start, &self.stride, &self.count, &self.block)
            .map(|(&start, &stride, &count, &block)| {
                let end = (count - 1)
                    .saturating_mul(stride)
                    .saturating_add(block)
                    .saturating_add(start);
                start..end
            })
            .into()
    }

    /// The selected intervals of each dimension as `(start, length)`, with adjacent blocks merged.
    fn intervals(&self) -> Vec<Vec<(u64, u64)>> {
        izip!(&self.start, &self.stride, &self.count, &self.block)
            .map(|(&start, &stride, &count, &block)| {
                (0..count)
                    .map(|i| (start + i * stride, block))
                    .coalesce(|a, b| {
                        if a.0 + a.1 == b.0 {
                            Ok((a.0, a.1 + b.1))
                        } else {
                            Err((a, b))
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Decompose the hyperslab into disjoint blocks.
    ///
    /// Blocks that are adjacent in a dimension (`stride == block`) are merged.
    #[must_use]
    pub fn blocks(&self) -> Vec<ArraySubset> {
        if self.is_empty() {
            return vec![];
        }
        self.intervals()
            .into_iter()
            .fold(vec![ArraySubset::new_with_shape(vec![])], |blocks, intervals| {
                blocks
                    .iter()
                    .flat_map(|block| {
                        intervals.iter().map(move |&(start, size)| {
                            let mut block = block.clone();
                            block.start.push(start);
                            block.shape.push(size);
                            block
                        })
                    })
                    .collect()
            })
    }
}
