//! `slabstore` global configuration options.
//!
//! See [`Config`] for the list of options.

use std::sync::LazyLock;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the `slabstore` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Validate Checksums
/// > default: [`true`]
///
/// If enabled, checksum codecs (e.g. `fletcher32`, `crc32c`) will validate that encoded data matches stored checksums, otherwise validation is skipped.
///
/// ## Chunk Concurrent Minimum
/// > default: `4`
///
/// Reads and writes that touch more chunks than this process chunks in parallel on the [`rayon`] thread pool.
///
/// ## Compact Size Limit
/// > default: `65520`
///
/// The maximum size in bytes of a dataset with the [`Compact`](crate::dataset::StorageLayout::Compact) layout.
#[derive(Debug, Clone)]
pub struct Config {
    validate_checksums: bool,
    chunk_concurrent_minimum: usize,
    compact_size_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validate_checksums: true,
            chunk_concurrent_minimum: 4,
            compact_size_limit: 65520,
        }
    }
}

impl Config {
    /// Get the [validate checksums](#validate-checksums) configuration.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set the [validate checksums](#validate-checksums) configuration.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) -> &mut Self {
        self.validate_checksums = validate_checksums;
        self
    }

    /// Get the [chunk concurrent minimum](#chunk-concurrent-minimum) configuration.
    #[must_use]
    pub fn chunk_concurrent_minimum(&self) -> usize {
        self.chunk_concurrent_minimum
    }

    /// Set the [chunk concurrent minimum](#chunk-concurrent-minimum) configuration.
    pub fn set_chunk_concurrent_minimum(&mut self, chunk_concurrent_minimum: usize) -> &mut Self {
        self.chunk_concurrent_minimum = chunk_concurrent_minimum;
        self
    }

    /// Get the [compact size limit](#compact-size-limit) configuration.
    #[must_use]
    pub fn compact_size_limit(&self) -> u64 {
        self.compact_size_limit
    }

    /// Set the [compact size limit](#compact-size-limit) configuration.
    pub fn set_compact_size_limit(&mut self, compact_size_limit: u64) -> &mut Self {
        self.compact_size_limit = compact_size_limit;
        self
    }
}

static CONFIG: LazyLock<RwLock<Config>> = LazyLock::new(|| RwLock::new(Config::default()));

/// Returns a reference to the global `slabstore` configuration.
///
/// This deadlocks if the global config is already held mutably by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read()
}

/// Returns a mutable reference to the global `slabstore` configuration.
///
/// This deadlocks if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.write()
}
