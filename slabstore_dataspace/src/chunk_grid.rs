//! The regular chunk grid.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::{
    ArrayIndices, ArrayShape, ArraySubset, ChunkShape, IncompatibleDimensionalityError,
    iterators::Indices,
};

/// A regular chunk grid.
///
/// Every chunk has the same shape.
/// Chunks on the boundary of an array may extend past the array extent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegularChunkGrid {
    chunk_shape: ChunkShape,
}

impl RegularChunkGrid {
    /// Create a new regular chunk grid with chunk shape `chunk_shape`.
    #[must_use]
    pub fn new(chunk_shape: ChunkShape) -> Self {
        Self { chunk_shape }
    }

    /// Return the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[NonZeroU64] {
        &self.chunk_shape
    }

    /// Return the chunk shape as a [`u64`] shape.
    #[must_use]
    pub fn chunk_shape_u64(&self) -> ArrayShape {
        self.chunk_shape.iter().map(|size| size.get()).collect()
    }

    /// Return the dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.chunk_shape.len()
    }

    /// Return the number of elements in a chunk.
    #[must_use]
    pub fn chunk_num_elements(&self) -> u64 {
        self.chunk_shape.iter().map(|size| size.get()).product()
    }

    fn check_dimensionality(&self, len: usize) -> Result<(), IncompatibleDimensionalityError> {
        if len == self.dimensionality() {
            Ok(())
        } else {
            Err(IncompatibleDimensionalityError::new(
                len,
                self.dimensionality(),
            ))
        }
    }

    /// Return the number of chunks in each dimension needed to cover an array of `array_shape`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `array_shape` does not match the dimensionality of the grid.
    pub fn grid_shape(
        &self,
        array_shape: &[u64],
    ) -> Result<ArrayShape, IncompatibleDimensionalityError> {
        self.check_dimensionality(array_shape.len())?;
        Ok(std::iter::zip(array_shape, &self.chunk_shape)
            .map(|(&size, chunk_size)| size.div_ceil(chunk_size.get()))
            .collect())
    }

    /// Return the array subset of the chunk at `chunk_indices`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `chunk_indices` does not match the dimensionality of the grid.
    pub fn chunk_subset(
        &self,
        chunk_indices: &[u64],
    ) -> Result<ArraySubset, IncompatibleDimensionalityError> {
        self.check_dimensionality(chunk_indices.len())?;
        Ok(std::iter::zip(chunk_indices, &self.chunk_shape)
            .map(|(&index, size)| {
                let start = index * size.get();
                start..start + size.get()
            })
            .into())
    }

    /// Return the indices of the chunk containing the element at `array_indices`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `array_indices` does not match the dimensionality of the grid.
    pub fn chunk_indices(
        &self,
        array_indices: &[u64],
    ) -> Result<ArrayIndices, IncompatibleDimensionalityError> {
        self.check_dimensionality(array_indices.len())?;
        Ok(std::iter::zip(array_indices, &self.chunk_shape)
            .map(|(&index, size)| index / size.get())
            .collect())
    }

    /// Return an iterator over the indices of every chunk covering an array of `array_shape`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `array_shape` does not match the dimensionality of the grid.
    pub fn chunks(&self, array_shape: &[u64]) -> Result<Indices, IncompatibleDimensionalityError> {
        Ok(ArraySubset::new_with_shape(self.grid_shape(array_shape)?).indices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(chunk_shape: &[u64]) -> RegularChunkGrid {
        RegularChunkGrid::new(
            chunk_shape
                .iter()
                .map(|&size| NonZeroU64::new(size).unwrap_or(NonZeroU64::MIN))
                .collect(),
        )
    }

    #[test]
    fn chunk_grid_regular() -> Result<(), IncompatibleDimensionalityError> {
        let grid = grid(&[4, 4]);
        assert_eq!(grid.chunk_num_elements(), 16);
        assert_eq!(grid.grid_shape(&[6, 8])?, vec![2, 2]);
        assert_eq!(grid.grid_shape(&[0, 9])?, vec![0, 3]);
        assert_eq!(
            grid.chunk_subset(&[1, 0])?,
            ArraySubset::new_with_ranges(&[4..8, 0..4])
        );
        assert_eq!(grid.chunk_indices(&[5, 3])?, vec![1, 0]);
        assert_eq!(grid.chunks(&[6, 8])?.count(), 4);
        assert!(grid.grid_shape(&[6]).is_err());
        Ok(())
    }
}
