//! Iterators over array subsets and selections.
//!
//! All iterators produce elements in C order (the last dimension fastest).

mod indices_iterator;
mod selection_runs;

pub use indices_iterator::Indices;
pub use selection_runs::{SelectionIndices, SelectionRun, SelectionRuns};
