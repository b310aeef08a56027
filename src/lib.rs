#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Crate layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | Per-namespace sizing maps and construction-time validation |
//! | [`lfu`] | The O(1) LFU store and its thread-safe wrapper |
//! | [`todo`] | Cache keys, domain model, repository/codec seams, coherent service |
//!
//! Dependency order is leaves-first: the store knows nothing about todos,
//! the coherence layer owns the keying scheme and the invalidation rules,
//! and host applications wire the two together with a repository and an id
//! codec at startup.

/// Cache configuration structures.
///
/// Provides the per-namespace capacity and cleanup-size maps and the fatal
/// validation performed once at cache construction.
pub mod config;

/// Intrusive node types backing the LFU store.
///
/// Internal infrastructure: raw-pointer entry and bucket nodes plus their
/// constant-time splice operations. Not part of the public API.
pub(crate) mod entry;

/// Least Frequently Used (LFU) cache implementation.
///
/// Provides a fixed-capacity store that evicts the least frequently used
/// entries in configurable batches, with an LRU tiebreak among entries of
/// equal frequency.
pub mod lfu;

/// Todo cache-coherence layer.
///
/// Defines the keying scheme mapping per-user reads to cache entries, and
/// the invalidation set each mutation evicts to keep cached reads
/// consistent with the repository.
pub mod todo;

// Re-export the public surface
pub use config::{CacheNamespace, ConfigError, LfuConfig};
pub use lfu::LfuCache;
pub use todo::{
    CachedTodoService, CodecError, IdCodec, RepositoryError, Todo, TodoCacheKey, TodoCacheValue,
    TodoError, TodoPatch, TodoRepository, TodoRequest, TodoScope, TodoView,
};
