use std::{iter::FusedIterator, sync::Arc};

use itertools::Itertools;

use crate::{ArrayIndices, ArraySubset};

/// A run of elements contiguous in the last dimension.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectionRun {
    /// The indices of the first element of the run.
    pub start: ArrayIndices,
    /// The number of elements in the run.
    pub len: u64,
}

/// An interval of one dimension in which the same boxes are active.
#[derive(Clone, Debug)]
struct Segment {
    start: u64,
    end: u64,
    active: Vec<usize>,
}

/// The position of the iterator in one of the leading dimensions.
#[derive(Clone, Debug)]
struct Frame {
    segments: Vec<Segment>,
    segment: usize,
    index: u64,
}

impl Frame {
    fn new(boxes: &[ArraySubset], active: &[usize], dim: usize) -> Self {
        let mut breakpoints = active
            .iter()
            .flat_map(|&i| {
                let start = boxes[i].start[dim];
                [start, start + boxes[i].shape[dim]]
            })
            .collect_vec();
        breakpoints.sort_unstable();
        breakpoints.dedup();
        let segments = breakpoints
            .iter()
            .tuple_windows()
            .filter_map(|(&start, &end)| {
                let active = active
                    .iter()
                    .copied()
                    .filter(|&i| {
                        let box_start = boxes[i].start[dim];
                        box_start <= start && box_start + boxes[i].shape[dim] >= end
                    })
                    .collect_vec();
                (!active.is_empty()).then_some(Segment { start, end, active })
            })
            .collect_vec();
        let index = segments.first().map_or(0, |segment| segment.start);
        Self {
            segments,
            segment: 0,
            index,
        }
    }

    fn active(&self) -> Option<&[usize]> {
        self.segments
            .get(self.segment)
            .map(|segment| segment.active.as_slice())
    }

    /// Move to the next index. Returns false once the frame is exhausted.
    fn advance(&mut self) -> bool {
        let Some(segment) = self.segments.get(self.segment) else {
            return false;
        };
        self.index += 1;
        if self.index < segment.end {
            return true;
        }
        self.segment += 1;
        match self.segments.get(self.segment) {
            Some(segment) => {
                self.index = segment.start;
                true
            }
            None => false,
        }
    }
}

/// A lazy iterator over the runs of a selection in C order.
///
/// Each run covers elements of one row that are contiguous in the last dimension.
/// Runs from adjacent boxes in the same row are merged.
/// Only the boxes intersecting the current row are examined, so memory use is bounded by the number of boxes and the dimensionality, not the number of selected elements.
#[derive(Clone, Debug)]
pub struct SelectionRuns {
    boxes: Arc<[ArraySubset]>,
    dimensionality: usize,
    stack: Vec<Frame>,
    started: bool,
    row: Vec<(u64, u64)>,
    row_position: usize,
}

impl SelectionRuns {
    /// Create a run iterator over disjoint, non-empty `boxes`.
    pub(crate) fn new(boxes: Arc<[ArraySubset]>, dimensionality: usize) -> Self {
        Self {
            boxes,
            dimensionality,
            stack: Vec::with_capacity(dimensionality.saturating_sub(1)),
            started: false,
            row: Vec::new(),
            row_position: 0,
        }
    }

    /// Push frames down to the last dimension and gather the runs of the row.
    fn descend(&mut self) -> bool {
        while self.stack.len() + 1 < self.dimensionality {
            let dim = self.stack.len();
            let frame = match self.stack.last() {
                Some(parent) => match parent.active() {
                    Some(active) => Frame::new(&self.boxes, active, dim),
                    None => return false,
                },
                None => Frame::new(&self.boxes, &(0..self.boxes.len()).collect_vec(), dim),
            };
            if frame.segments.is_empty() {
                return false;
            }
            self.stack.push(frame);
        }

        let last = self.dimensionality - 1;
        let active = match self.stack.last() {
            Some(frame) => frame.active().map(<[usize]>::to_vec).unwrap_or_default(),
            None => (0..self.boxes.len()).collect_vec(),
        };
        let mut intervals = active
            .iter()
            .map(|&i| {
                let start = self.boxes[i].start[last];
                (start, start + self.boxes[i].shape[last])
            })
            .collect_vec();
        intervals.sort_unstable();
        self.row = intervals
            .into_iter()
            .coalesce(|a, b| if a.1 == b.0 { Ok((a.0, b.1)) } else { Err((a, b)) })
            .collect();
        self.row_position = 0;
        true
    }

    fn next_row(&mut self) -> bool {
        if !self.started {
            self.started = true;
            return self.descend();
        }
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return false;
            };
            if frame.advance() {
                break;
            }
            self.stack.pop();
        }
        self.descend()
    }
}

impl Iterator for SelectionRuns {
    type Item = SelectionRun;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dimensionality == 0 {
            if self.started || self.boxes.is_empty() {
                return None;
            }
            self.started = true;
            return Some(SelectionRun {
                start: vec![],
                len: 1,
            });
        }
        loop {
            if let Some(&(start, end)) = self.row.get(self.row_position) {
                self.row_position += 1;
                let mut indices = self.stack.iter().map(|frame| frame.index).collect_vec();
                indices.push(start);
                return Some(SelectionRun {
                    start: indices,
                    len: end - start,
                });
            }
            if !self.next_row() {
                return None;
            }
        }
    }
}

impl FusedIterator for SelectionRuns {}

/// A lazy iterator over the indices of a selection in C order.
#[derive(Clone, Debug)]
pub struct SelectionIndices {
    runs: SelectionRuns,
    current: Option<(ArrayIndices, u64)>,
}

impl SelectionIndices {
    pub(crate) fn new(runs: SelectionRuns) -> Self {
        Self {
            runs,
            current: None,
        }
    }
}

impl Iterator for SelectionIndices {
    type Item = ArrayIndices;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((indices, remaining)) = &mut self.current
                && *remaining > 0
            {
                let item = indices.clone();
                *remaining -= 1;
                if let Some(last) = indices.last_mut() {
                    *last += 1;
                }
                return Some(item);
            }
            let run = self.runs.next()?;
            self.current = Some((run.start, run.len));
        }
    }
}

impl FusedIterator for SelectionIndices {}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(boxes: Vec<ArraySubset>, dimensionality: usize) -> Vec<(ArrayIndices, u64)> {
        SelectionRuns::new(boxes.into(), dimensionality)
            .map(|run| (run.start, run.len))
            .collect()
    }

    #[test]
    fn selection_runs_rank1() {
        let boxes = vec![
            ArraySubset::new_with_ranges(&[5..7]),
            ArraySubset::new_with_ranges(&[0..2]),
            ArraySubset::new_with_ranges(&[2..3]),
        ];
        assert_eq!(runs(boxes, 1), vec![(vec![0], 3), (vec![5], 2)]);
    }

    #[test]
    fn selection_runs_interleaved() {
        // Two overlapping rectangles split into disjoint boxes
        let boxes = vec![
            ArraySubset::new_with_ranges(&[0..2, 0..2]),
            ArraySubset::new_with_ranges(&[1..3, 2..4]),
            ArraySubset::new_with_ranges(&[2..3, 1..2]),
        ];
        assert_eq!(
            runs(boxes, 2),
            vec![
                (vec![0, 0], 2),
                (vec![1, 0], 4),
                (vec![2, 1], 3),
            ]
        );
    }

    #[test]
    fn selection_runs_gaps() {
        let boxes = vec![
            ArraySubset::new_with_ranges(&[0..1, 0..1, 0..2]),
            ArraySubset::new_with_ranges(&[0..1, 2..3, 0..2]),
            ArraySubset::new_with_ranges(&[3..4, 0..1, 1..2]),
        ];
        assert_eq!(
            runs(boxes, 3),
            vec![
                (vec![0, 0, 0], 2),
                (vec![0, 2, 0], 2),
                (vec![3, 0, 1], 1),
            ]
        );
    }

    #[test]
    fn selection_runs_empty() {
        assert_eq!(runs(vec![], 2), vec![]);
        assert_eq!(runs(vec![], 0), vec![]);
        assert_eq!(
            runs(vec![ArraySubset::new_with_shape(vec![])], 0),
            vec![(vec![], 1)]
        );
    }

    #[test]
    fn selection_runs_restartable() {
        let iter = SelectionRuns::new(
            vec![ArraySubset::new_with_ranges(&[1..3, 1..3])].into(),
            2,
        );
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn selection_indices() {
        let runs = SelectionRuns::new(
            vec![
                ArraySubset::new_with_ranges(&[0..1, 3..4]),
                ArraySubset::new_with_ranges(&[0..2, 0..2]),
            ]
            .into(),
            2,
        );
        assert_eq!(
            SelectionIndices::new(runs).collect::<Vec<_>>(),
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 3],
                vec![1, 0],
                vec![1, 1]
            ]
        );
    }
}
