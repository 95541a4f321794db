#![allow(missing_docs)]

use std::collections::BTreeSet;

use proptest::prelude::*;

use slabstore_dataspace::{
    ArrayIndices, ArraySubset, Hyperslab, RegularChunkGrid, Selection, SelectionError,
    SelectionOperator, map_to_chunks, ravel_indices,
};

const SHAPE: [u64; 3] = [7, 9, 5];

/// A valid `(start, stride, count, block)` for one dimension of extent `extent`.
fn dimension_strategy(extent: u64) -> impl Strategy<Value = (u64, u64, u64, u64)> {
    (1..=3u64, 0..3u64, 1..=3u64).prop_flat_map(move |(block, gap, count)| {
        let stride = block + gap;
        let count = (1..=count)
            .rev()
            .find(|&count| (count - 1) * stride + block <= extent)
            .unwrap_or(1);
        let span = (count - 1) * stride + block;
        (0..=extent - span).prop_map(move |start| (start, stride, count, block))
    })
}

fn hyperslab_strategy() -> impl Strategy<Value = Hyperslab> {
    (
        dimension_strategy(SHAPE[0]),
        dimension_strategy(SHAPE[1]),
        dimension_strategy(SHAPE[2]),
    )
        .prop_filter_map("invalid hyperslab", |dims| {
            let dims = [dims.0, dims.1, dims.2];
            Hyperslab::new(
                dims.iter().map(|dim| dim.0).collect(),
                dims.iter().map(|dim| dim.1).collect(),
                dims.iter().map(|dim| dim.2).collect(),
                dims.iter().map(|dim| dim.3).collect(),
            )
            .ok()
        })
}

fn operator_strategy() -> impl Strategy<Value = SelectionOperator> {
    proptest::sample::select(OPERATORS.to_vec())
}

fn in_hyperslab(hyperslab: &Hyperslab, indices: &[u64]) -> bool {
    (0..indices.len()).all(|dim| {
        let (start, stride, count, block) = (
            hyperslab.start()[dim],
            hyperslab.stride()[dim],
            hyperslab.count()[dim],
            hyperslab.block()[dim],
        );
        let Some(offset) = indices[dim].checked_sub(start) else {
            return false;
        };
        match count {
            0 => false,
            1 => offset < block,
            _ => offset / stride < count && offset % stride < block,
        }
    })
}

fn all_indices() -> Vec<ArrayIndices> {
    ArraySubset::new_with_shape(SHAPE.to_vec()).indices().collect()
}

fn reference_combine(
    selected: &BTreeSet<ArrayIndices>,
    operator: SelectionOperator,
    hyperslab: &Hyperslab,
) -> BTreeSet<ArrayIndices> {
    all_indices()
        .into_iter()
        .filter(|indices| {
            let a = selected.contains(indices);
            let b = in_hyperslab(hyperslab, indices);
            match operator {
                SelectionOperator::Set => b,
                SelectionOperator::Or => a || b,
                SelectionOperator::And => a && b,
                SelectionOperator::Xor => a != b,
                SelectionOperator::NotB => a && !b,
                SelectionOperator::NotA => b && !a,
            }
        })
        .collect()
}

const OPERATORS: [SelectionOperator; 6] = [
    SelectionOperator::Set,
    SelectionOperator::Or,
    SelectionOperator::And,
    SelectionOperator::Xor,
    SelectionOperator::NotB,
    SelectionOperator::NotA,
];

proptest! {
    #[test]
    fn selection_matches_elementwise_reference(
        first in hyperslab_strategy(),
        steps in proptest::collection::vec((operator_strategy(), hyperslab_strategy()), 0..4),
    ) {
        let mut selection = Selection::new_none(SHAPE.to_vec());
        let mut reference = BTreeSet::new();
        let steps = std::iter::once((SelectionOperator::Set, first)).chain(steps);
        for (operator, hyperslab) in steps {
            selection.select_hyperslab(operator, &hyperslab)?;
            reference = reference_combine(&reference, operator, &hyperslab);

            let indices: Vec<ArrayIndices> = selection.indices().collect();
            prop_assert_eq!(
                indices,
                reference.iter().cloned().collect::<Vec<_>>(),
                "{} {}", operator, hyperslab
            );
            prop_assert_eq!(selection.num_elements(), reference.len() as u64);
            for (i, a) in selection.boxes().iter().enumerate() {
                for b in &selection.boxes()[i + 1..] {
                    prop_assert!(!a.overlaps(b));
                }
            }
        }
    }

    #[test]
    fn chunk_mapping_covers_selection(
        set in hyperslab_strategy(),
        xor in hyperslab_strategy(),
    ) {
        let chunk_grid = RegularChunkGrid::new(
            [3u64, 4, 2]
                .into_iter()
                .filter_map(std::num::NonZeroU64::new)
                .collect(),
        );
        let chunk_shape = chunk_grid.chunk_shape_u64();
        let selection = Selection::new_none(SHAPE.to_vec())
            .with_hyperslab(SelectionOperator::Set, &set)?
            .with_hyperslab(SelectionOperator::Xor, &xor)?;
        let mapping = map_to_chunks(selection.runs(), &chunk_grid)?;
        prop_assert_eq!(mapping.num_elements(), selection.num_elements());

        // Rebuild the selection order from the chunk runs
        let mut by_selection_offset = vec![None; usize::try_from(selection.num_elements())?];
        for (chunk_indices, runs) in &mapping {
            let chunk_subset = chunk_grid.chunk_subset(chunk_indices)?;
            let chunk_elements: Vec<ArrayIndices> = chunk_subset.indices().collect();
            let mut previous_end = 0;
            for run in runs {
                prop_assert!(run.chunk_offset >= previous_end);
                previous_end = run.chunk_offset + run.len;
                for i in 0..run.len {
                    let element = &chunk_elements[usize::try_from(run.chunk_offset + i)?];
                    let element_in_chunk: Vec<u64> = element
                        .iter()
                        .zip(chunk_subset.start())
                        .map(|(e, s)| e - s)
                        .collect();
                    prop_assert_eq!(
                        ravel_indices(&element_in_chunk, &chunk_shape),
                        run.chunk_offset + i
                    );
                    by_selection_offset[usize::try_from(run.selection_offset + i)?] =
                        Some(element.clone());
                }
            }
        }
        let rebuilt: Vec<ArrayIndices> = by_selection_offset.into_iter().flatten().collect();
        prop_assert_eq!(rebuilt, selection.indices().collect::<Vec<_>>());
    }
}

#[test]
fn not_b_l_shapes() -> Result<(), SelectionError> {
    let blocks = Hyperslab::new(vec![0, 0], vec![3, 3], vec![2, 3], vec![2, 2])?;
    let corners = Hyperslab::new(vec![0, 0], vec![3, 3], vec![2, 3], vec![1, 1])?;
    let selection = Selection::new_none(vec![6, 8])
        .with_hyperslab(SelectionOperator::Set, &blocks)?
        .with_hyperslab(SelectionOperator::NotB, &corners)?;

    let reference: Vec<ArrayIndices> = ArraySubset::new_with_shape(vec![6, 8])
        .indices()
        .filter(|indices| in_hyperslab(&blocks, indices) && !in_hyperslab(&corners, indices))
        .collect();
    assert_eq!(selection.indices().collect::<Vec<_>>(), reference);
    assert_eq!(reference.len(), 18);

    // Each block keeps exactly three elements, forming an L
    for block in blocks.blocks() {
        let kept = reference
            .iter()
            .filter(|indices| block.contains(indices))
            .count();
        assert_eq!(kept, 3);
    }
    Ok(())
}
