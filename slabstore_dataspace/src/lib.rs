//! The dataspace and hyperslab selection API for the `slabstore` crate.
//!
//! A [`Dataspace`] holds the current and maximum extents of an n-dimensional array.
//! A [`Selection`] is a set of elements built by combining [`Hyperslab`]s with a [`SelectionOperator`].
//! Selections resolve lazily into row-major runs of elements ([`SelectionRuns`](iterators::SelectionRuns)),
//! and [`map_to_chunks`] groups those runs by the chunk of a [`RegularChunkGrid`] they fall in.
//!
//! ## Licence
//! `slabstore_dataspace` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

mod array_subset;
mod chunk_grid;
mod chunk_mapping;
mod dataspace;
mod hyperslab;
pub mod iterators;
mod selection;

use std::num::NonZeroU64;

use thiserror::Error;

pub use array_subset::ArraySubset;
pub use chunk_grid::RegularChunkGrid;
pub use chunk_mapping::{ChunkMapping, ChunkRun, map_to_chunks};
pub use dataspace::{Dataspace, DataspaceError, MaxExtent};
pub use hyperslab::Hyperslab;
pub use selection::{Selection, SelectionOperator};

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// An ND index to an element in an array or chunk.
pub type ArrayIndices = Vec<u64>;

/// The shape of a chunk. All dimensions must be non-zero.
pub type ChunkShape = Vec<NonZeroU64>;

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// A selection error.
#[derive(Clone, Debug, Error)]
pub enum SelectionError {
    /// The dimensionality of a hyperslab, extent, or chunk shape does not match the selection.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// Selected elements lie outside the extent.
    #[error("selection {subset} is out of bounds of extent {extent:?}")]
    OutOfBounds {
        /// The region that is out of bounds.
        subset: ArraySubset,
        /// The extent.
        extent: ArrayShape,
    },
    /// The hyperslab parameters are invalid.
    #[error("invalid hyperslab {0}: {1}")]
    InvalidHyperslab(Hyperslab, String),
}

/// Return the number of elements of `shape`.
#[must_use]
pub fn num_elements(shape: &[u64]) -> u64 {
    shape.iter().product()
}

/// Convert `indices` into a linearised (row-major) index within an array of `shape`.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    std::iter::zip(indices, shape).fold(0, |index, (&i, &s)| index * s + i)
}
