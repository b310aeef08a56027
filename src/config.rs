//! Cache configuration.
//!
//! The service constructs one cache instance per [`CacheNamespace`] from a
//! single [`LfuConfig`], which carries two maps loaded from the application
//! configuration file: per-namespace capacities and per-namespace cleanup
//! (batch eviction) sizes.
//!
//! A namespace absent from `capacities` gets capacity 0, which produces a
//! permanently empty cache: every operation on it is a no-op. This is the
//! supported way to disable caching for a namespace without touching any
//! call sites.
//!
//! For a namespace with capacity ≥ 1, the cleanup size must be present and
//! within `1..=capacity`; anything else is a configuration error reported at
//! construction, before the service starts taking traffic.

use core::fmt;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies one cache instance in the configuration maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheNamespace {
    /// The per-user todo read cache.
    Todo,
}

impl CacheNamespace {
    /// The namespace's key in the configuration file.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheNamespace::Todo => "todo",
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sizing configuration for every LFU cache instance in the service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LfuConfig {
    /// Maximum number of entries each namespace may hold simultaneously.
    /// A missing namespace means capacity 0: caching disabled.
    #[serde(default)]
    pub capacities: HashMap<CacheNamespace, usize>,

    /// Number of entries evicted in one batch when a namespace first
    /// exceeds its capacity. Must be within `1..=capacity` for every
    /// namespace with a non-zero capacity.
    #[serde(default)]
    pub cleanup_sizes: HashMap<CacheNamespace, usize>,
}

impl LfuConfig {
    /// Returns the configured capacity for `namespace`, 0 if absent.
    pub fn capacity(&self, namespace: CacheNamespace) -> usize {
        self.capacities.get(&namespace).copied().unwrap_or(0)
    }

    /// Returns the configured cleanup size for `namespace`, 0 if absent.
    pub fn cleanup_size(&self, namespace: CacheNamespace) -> usize {
        self.cleanup_sizes.get(&namespace).copied().unwrap_or(0)
    }

    /// Validates the sizing of one namespace and returns
    /// `(capacity, cleanup_size)`.
    ///
    /// Capacity 0 is the degenerate, always-empty cache; its cleanup size is
    /// irrelevant and reported as 0.
    pub(crate) fn validated(
        &self,
        namespace: CacheNamespace,
    ) -> Result<(usize, usize), ConfigError> {
        let capacity = self.capacity(namespace);
        if capacity == 0 {
            return Ok((0, 0));
        }

        match self.cleanup_sizes.get(&namespace).copied() {
            None => Err(ConfigError::MissingCleanupSize { namespace, capacity }),
            Some(cleanup_size) if cleanup_size < 1 || cleanup_size > capacity => {
                Err(ConfigError::CleanupSizeOutOfRange {
                    namespace,
                    capacity,
                    cleanup_size,
                })
            }
            Some(cleanup_size) => Ok((capacity, cleanup_size)),
        }
    }
}

/// Fatal configuration errors raised while constructing a cache.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A namespace has a capacity but no cleanup size.
    #[error("cache namespace `{namespace}` has capacity {capacity} but no cleanup size")]
    MissingCleanupSize {
        /// The misconfigured namespace.
        namespace: CacheNamespace,
        /// Its configured capacity.
        capacity: usize,
    },

    /// A namespace's cleanup size is outside `1..=capacity`.
    #[error(
        "cleanup size {cleanup_size} for cache namespace `{namespace}` \
         must be between 1 and its capacity {capacity}"
    )]
    CleanupSizeOutOfRange {
        /// The misconfigured namespace.
        namespace: CacheNamespace,
        /// Its configured capacity.
        capacity: usize,
        /// The rejected cleanup size.
        cleanup_size: usize,
    },
}
