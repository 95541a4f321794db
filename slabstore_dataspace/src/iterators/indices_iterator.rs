use std::iter::FusedIterator;

use crate::{ArrayIndices, ArraySubset};

/// An iterator over the indices in an array subset.
///
/// Iterates over the last dimension fastest (i.e. C-contiguous order).
/// For example, consider a 4x3 array with element indices
/// ```text
/// (0, 0)  (0, 1)  (0, 2)
/// (1, 0)  (1, 1)  (1, 2)
/// (2, 0)  (2, 1)  (2, 2)
/// (3, 0)  (3, 1)  (3, 2)
/// ```
/// An iterator with an array subset corresponding to the lower right 2x2 region will produce `[(2, 1), (2, 2), (3, 1), (3, 2)]`.
#[derive(Clone, Debug)]
pub struct Indices {
    subset: ArraySubset,
    next: Option<ArrayIndices>,
    remaining: u64,
}

impl Indices {
    /// Create a new indices iterator.
    #[must_use]
    pub fn new(subset: ArraySubset) -> Self {
        let remaining = subset.num_elements();
        let next = (remaining > 0).then(|| subset.start().to_vec());
        Self {
            subset,
            next,
            remaining,
        }
    }

    /// The array subset being iterated.
    #[must_use]
    pub fn subset(&self) -> &ArraySubset {
        &self.subset
    }
}

impl Iterator for Indices {
    type Item = ArrayIndices;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.remaining -= 1;
        if self.remaining > 0 {
            let mut next = current.clone();
            for dim in (0..next.len()).rev() {
                next[dim] += 1;
                if next[dim] < self.subset.start[dim] + self.subset.shape[dim] {
                    break;
                }
                next[dim] = self.subset.start[dim];
            }
            self.next = Some(next);
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl FusedIterator for Indices {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_iterator() {
        let subset = ArraySubset::new_with_ranges(&[2..4, 1..3]);
        let indices = subset.indices();
        assert_eq!(indices.size_hint(), (4, Some(4)));
        assert_eq!(
            indices.collect::<Vec<_>>(),
            vec![vec![2, 1], vec![2, 2], vec![3, 1], vec![3, 2]]
        );
    }

    #[test]
    fn indices_iterator_empty() {
        let subset = ArraySubset::new_with_ranges(&[2..4, 1..1]);
        assert_eq!(subset.indices().next(), None);
    }

    #[test]
    fn indices_iterator_rank0() {
        let subset = ArraySubset::new_with_shape(vec![]);
        assert_eq!(subset.indices().collect::<Vec<_>>(), vec![Vec::<u64>::new()]);
    }
}
