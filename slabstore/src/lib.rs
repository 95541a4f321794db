//! `slabstore` is a chunked, compressed, resizable n-dimensional array storage engine.
//!
//! A [`Dataset`](dataset::Dataset) is an n-dimensional array of fixed-size numeric elements with
//!  - a current and maximum extent (a [`Dataspace`](dataspace::Dataspace)), which can grow up to the maximum with [`resize`](dataset::Dataset::resize),
//!  - a storage layout: compact (inline in the dataset metadata), contiguous (a single region), or chunked,
//!  - an optional fill value, returned for elements that have never been written,
//!  - an ordered pipeline of codecs (shuffle, compression, checksums) applied to each chunk, and
//!  - an allocation time policy: chunks are allocated when first written, or all at once when the dataset is created or grown.
//!
//! Reads and writes take a [`Selection`](dataspace::Selection) built by combining hyperslabs (strided blocks) with set operators.
//! Each touched chunk is read, modified, and rewritten atomically with respect to other writes to the same chunk.
//!
//! ## Example
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use slabstore::dataset::{DataType, DatasetBuilder};
//! use slabstore::dataspace::{Hyperslab, MaxExtent, Selection, SelectionOperator};
//! use slabstore::storage::backend::MemoryBackend;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let mut dataset = DatasetBuilder::new(vec![4, 7], DataType::INT32)
//!     .max_shape(vec![MaxExtent::Bounded(6), MaxExtent::Unlimited])
//!     .chunk_shape(vec![2, 4])
//!     .fill_value(99i32)
//!     .build(backend)?;
//! dataset.write_elements(&dataset.dataspace().select_all(), &[1i32; 28])?;
//! dataset.resize(&[6, 10])?;
//!
//! let corner = Hyperslab::new(vec![4, 7], vec![1, 1], vec![1, 1], vec![2, 3])?;
//! let selection = Selection::new_none(vec![6, 10]).with_hyperslab(SelectionOperator::Set, &corner)?;
//! assert_eq!(dataset.read_elements::<i32>(&selection)?, vec![99; 6]);
//! dataset.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `crc32c`, `gzip`, `lzf`, `zlib`, `zstd`: enable the corresponding codecs.
//!
//! ## Licence
//! `slabstore` is licensed under either of
//!  - the Apache License, Version 2.0 [LICENSE-APACHE](https://www.apache.org/licenses/LICENSE-2.0) or <http://www.apache.org/licenses/LICENSE-2.0>, or
//!  - the MIT license [LICENSE-MIT](https://opensource.org/licenses/MIT) or <http://opensource.org/licenses/MIT>, at your option.

pub mod config;
pub mod dataset;

pub use slabstore_codec as codec;
pub use slabstore_dataspace as dataspace;
pub use slabstore_storage as storage;
