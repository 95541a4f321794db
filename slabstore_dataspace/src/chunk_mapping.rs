//! Mapping selections onto chunks.

use std::collections::{BTreeMap, btree_map};

use crate::{
    ArrayIndices, IncompatibleDimensionalityError, RegularChunkGrid, iterators::SelectionRun,
    ravel_indices,
};

/// A run of elements that are contiguous both within a chunk and within a selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkRun {
    /// The linearised (C order) offset of the first element within the chunk.
    pub chunk_offset: u64,
    /// The position of the first element in selection order.
    pub selection_offset: u64,
    /// The number of elements.
    pub len: u64,
}

/// The runs of a selection grouped by chunk.
///
/// Runs of each chunk are sorted by both their chunk offset and selection offset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkMapping {
    chunks: BTreeMap<ArrayIndices, Vec<ChunkRun>>,
    num_elements: u64,
}

impl ChunkMapping {
    /// The number of chunks touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if no chunks are touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The total number of mapped elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.num_elements
    }

    /// The runs within the chunk at `chunk_indices`.
    #[must_use]
    pub fn get(&self, chunk_indices: &[u64]) -> Option<&[ChunkRun]> {
        self.chunks.get(chunk_indices).map(Vec::as_slice)
    }

    /// Iterate over chunks and their runs, ordered by chunk indices.
    pub fn iter(&self) -> btree_map::Iter<'_, ArrayIndices, Vec<ChunkRun>> {
        self.chunks.iter()
    }

    fn push(&mut self, chunk_indices: ArrayIndices, run: ChunkRun) {
        let runs = self.chunks.entry(chunk_indices).or_default();
        match runs.last_mut() {
            Some(last)
                if last.chunk_offset + last.len == run.chunk_offset
                    && last.selection_offset + last.len == run.selection_offset =>
            {
                last.len += run.len;
            }
            _ => runs.push(run),
        }
        self.num_elements += run.len;
    }
}

impl IntoIterator for ChunkMapping {
    type Item = (ArrayIndices, Vec<ChunkRun>);
    type IntoIter = btree_map::IntoIter<ArrayIndices, Vec<ChunkRun>>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChunkMapping {
    type Item = (&'a ArrayIndices, &'a Vec<ChunkRun>);
    type IntoIter = btree_map::Iter<'a, ArrayIndices, Vec<ChunkRun>>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

/// Group the `runs` of a selection by the chunk of `chunk_grid` they fall in.
///
/// Runs are split at chunk boundaries of the last dimension.
/// Consecutive runs of a chunk are merged when they are contiguous in both the chunk and the selection, so a selection covering whole chunks maps to a single run per chunk.
///
/// # Errors
/// Returns [`IncompatibleDimensionalityError`] if a run does not match the dimensionality of the chunk grid.
pub fn map_to_chunks(
    runs: impl IntoIterator<Item = SelectionRun>,
    chunk_grid: &RegularChunkGrid,
) -> Result<ChunkMapping, IncompatibleDimensionalityError> {
    let chunk_shape = chunk_grid.chunk_shape_u64();
    let last = chunk_shape.len().checked_sub(1);
    let mut mapping = ChunkMapping::default();
    for SelectionRun { start, len } in runs {
        if start.len() != chunk_shape.len() {
            return Err(IncompatibleDimensionalityError::new(
                start.len(),
                chunk_shape.len(),
            ));
        }
        let mut indices = start;
        let mut remaining = len;
        while remaining > 0 {
            let (chunk_indices, local_indices): (ArrayIndices, ArrayIndices) =
                std::iter::zip(&indices, &chunk_shape)
                    .map(|(&index, &size)| (index / size, index % size))
                    .unzip();
            let len = match last {
                Some(last) => remaining.min(chunk_shape[last] - local_indices[last]),
                None => remaining,
            };
            let run = ChunkRun {
                chunk_offset: ravel_indices(&local_indices, &chunk_shape),
                selection_offset: mapping.num_elements,
                len,
            };
            mapping.push(chunk_indices, run);
            remaining -= len;
            if let Some(last) = last {
                indices[last] += len;
            }
        }
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;
    use crate::{Selection, SelectionError, SelectionOperator, Hyperslab};

    fn grid(chunk_shape: &[u64]) -> RegularChunkGrid {
        RegularChunkGrid::new(
            chunk_shape
                .iter()
                .map(|&size| NonZeroU64::new(size).unwrap_or(NonZeroU64::MIN))
                .collect(),
        )
    }

    fn run(chunk_offset: u64, selection_offset: u64, len: u64) -> ChunkRun {
        ChunkRun {
            chunk_offset,
            selection_offset,
            len,
        }
    }

    #[test]
    fn map_to_chunks_full() -> Result<(), IncompatibleDimensionalityError> {
        let selection = Selection::new_all(vec![6, 8]);
        let mapping = map_to_chunks(selection.runs(), &grid(&[4, 4]))?;
        assert_eq!(mapping.len(), 4);
        assert_eq!(mapping.num_elements(), 48);
        assert_eq!(
            mapping.get(&[0, 0]),
            Some([run(0, 0, 4), run(4, 8, 4), run(8, 16, 4), run(12, 24, 4)].as_slice())
        );
        assert_eq!(
            mapping.get(&[1, 1]),
            Some([run(0, 36, 4), run(4, 44, 4)].as_slice())
        );
        Ok(())
    }

    #[test]
    fn map_to_chunks_merges_whole_chunks() -> Result<(), IncompatibleDimensionalityError> {
        let selection = Selection::new_all(vec![8, 4]);
        let mapping = map_to_chunks(selection.runs(), &grid(&[4, 4]))?;
        assert_eq!(mapping.get(&[0, 0]), Some([run(0, 0, 16)].as_slice()));
        assert_eq!(mapping.get(&[1, 0]), Some([run(0, 16, 16)].as_slice()));
        Ok(())
    }

    #[test]
    fn map_to_chunks_strided() -> Result<(), SelectionError> {
        let hyperslab = Hyperslab::new(vec![1, 2], vec![1, 3], vec![1, 2], vec![1, 2])?;
        let selection =
            Selection::new_none(vec![4, 8]).with_hyperslab(SelectionOperator::Set, &hyperslab)?;
        let mapping = map_to_chunks(selection.runs(), &grid(&[2, 4]))?;
        // Elements (1, 2) (1, 3) (1, 5) (1, 6)
        assert_eq!(mapping.get(&[0, 0]), Some([run(6, 0, 2)].as_slice()));
        assert_eq!(mapping.get(&[0, 1]), Some([run(5, 2, 2)].as_slice()));
        assert_eq!(mapping.num_elements(), 4);
        Ok(())
    }

    #[test]
    fn map_to_chunks_incompatible() {
        let selection = Selection::new_all(vec![6]);
        assert!(map_to_chunks(selection.runs(), &grid(&[4, 4])).is_err());
    }
}
