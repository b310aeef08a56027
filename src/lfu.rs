//! Least Frequently Used (LFU) store with batch eviction.
//!
//! Every cached entry carries a use count; entries with the same count are
//! grouped into a frequency bucket. Buckets form a doubly-linked list
//! ascending in use count, and each bucket owns a segment of one global
//! doubly-linked entry chain. The store keeps a `last` pointer at the
//! lowest-frequency end of that chain, so the next eviction victim is always
//! one pointer away.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         LFU store                                │
//! │                                                                  │
//! │  index: HashMap<K, *mut EntryNode>                               │
//! │  ┌─────────────┐                                                 │
//! │  │ "cold" ─────┼──▶ [used=1:  cold ◀▶ tepid]  ◀─ last            │
//! │  │ "tepid" ────┼──▶                │                             │
//! │  │ "warm" ─────┼──▶ [used=4:  warm]                              │
//! │  │ "hot" ──────┼──▶ [used=9:  hot]                               │
//! │  └─────────────┘                                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Operation | Action | Time |
//! |-----------|--------|------|
//! | `get` | promote entry to the next bucket, return value | O(1) |
//! | `set` | overwrite + promote, or insert at use count 1 | O(1) |
//! | `remove` | detach entry, drop empty bucket | O(1) |
//!
//! ## Eviction
//!
//! When inserting a fresh key into a full store, a batch of `cleanup_size`
//! entries is popped from `last` before the new entry is linked. Within a
//! bucket the victim is the entry furthest from `first`, i.e. the oldest
//! insertion at that frequency (LFU with an LRU tiebreak). Batch eviction
//! buys headroom: with `cleanup_size = n`, the next `n - 1` inserts proceed
//! without touching the chain.
//!
//! ## Degenerate capacity
//!
//! A store configured with capacity 0 is permanently empty: `set` is a
//! silent no-op and `get` always misses. See [`crate::config`].
//!
//! ## Thread safety
//!
//! [`LfuCache`] serializes every operation through a single mutex, giving
//! callers a linearizable view of each key. Values are cloned out of the
//! store while the lock is held; callers never borrow store internals.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ptr;

use hashbrown::DefaultHashBuilder;
use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::config::{CacheNamespace, ConfigError, LfuConfig};
use crate::entry::{Bucket, EntryNode};

/// Single-threaded LFU segment holding the actual algorithm.
///
/// All pointer surgery lives here; [`LfuCache`] wraps one segment in a mutex
/// to provide the thread-safe public surface.
///
/// # Safety
///
/// The `index` maps keys to raw nodes owned by the segment. A pointer stays
/// valid from the moment it is inserted until the entry is popped, removed,
/// or the segment is dropped; no operation hands a node out of the segment.
pub(crate) struct LfuSegment<K, V, S = DefaultHashBuilder> {
    /// Maximum number of simultaneously held entries.
    capacity: usize,
    /// Entries evicted per batch when the capacity is first exceeded.
    cleanup_size: usize,
    /// The sole O(1) lookup path from keys to live nodes.
    index: HashMap<K, *mut EntryNode<K, V>, S>,
    /// Lowest-frequency end of the entry chain: the next eviction victim.
    last: *mut EntryNode<K, V>,
}

// SAFETY: the segment exclusively owns every node its raw pointers reach;
// moving it across threads moves that ownership wholesale.
unsafe impl<K: Send, V: Send, S: Send> Send for LfuSegment<K, V, S> {}

// SAFETY: every mutation requires `&mut self`, so shared references cannot
// race on the pointer graph.
unsafe impl<K: Send, V: Send, S: Sync> Sync for LfuSegment<K, V, S> {}

impl<K: Hash + Eq + Clone, V, S: BuildHasher> LfuSegment<K, V, S> {
    /// Creates a segment with validated sizing.
    pub(crate) fn with_hasher(capacity: usize, cleanup_size: usize, hash_builder: S) -> Self {
        LfuSegment {
            capacity,
            cleanup_size,
            index: HashMap::with_capacity_and_hasher(capacity, hash_builder),
            last: ptr::null_mut(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn cleanup_size(&self) -> usize {
        self.cleanup_size
    }

    /// Inserts or overwrites `key`, promoting it if it already exists.
    pub(crate) fn set(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        if let Some(&node) = self.index.get(&key) {
            // SAFETY: index pointers reference live nodes owned by this segment.
            unsafe {
                (*node).value = value;
                self.promote(node);
            }
            return;
        }

        if self.index.len() >= self.capacity {
            self.evict();
        }
        // SAFETY: the key is fresh and at least one slot is free.
        unsafe {
            self.link_new(key, value);
        }
    }

    /// Promotes `key` and returns a reference to its value.
    pub(crate) fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = *self.index.get(key)?;
        // SAFETY: index pointers reference live nodes owned by this segment.
        unsafe {
            self.promote(node);
            Some(&(*node).value)
        }
    }

    /// Reads `key`'s use count without promoting it.
    pub(crate) fn use_count<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = *self.index.get(key)?;
        // SAFETY: index pointers reference live nodes, and every live node
        // belongs to exactly one live bucket.
        unsafe { Some((*(*node).bucket).used) }
    }

    /// Removes `key` if present.
    pub(crate) fn remove<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if let Some(node) = self.index.remove(key) {
            // SAFETY: the node was a live index member until this call.
            unsafe {
                let bucket = (*node).bucket;
                if (*bucket).first == node {
                    (*bucket).first = (*node).prev;
                }
                if self.last == node {
                    self.last = (*node).next;
                }
                (*bucket).length -= 1;
                EntryNode::unlink(node);
                if (*bucket).length == 0 {
                    Bucket::unlink(bucket);
                    drop(Box::from_raw(bucket));
                }
                drop(Box::from_raw(node));
            }
        }
    }

    /// Pops up to `cleanup_size` lowest-frequency entries.
    fn evict(&mut self) {
        for _ in 0..self.cleanup_size {
            if self.last.is_null() {
                break;
            }
            // SAFETY: `last` is non-null and points at a live chain tail.
            unsafe {
                self.pop_last();
            }
        }
    }

    /// Pops the entry at `last`: the oldest insertion in the
    /// lowest-frequency bucket.
    ///
    /// # Safety
    ///
    /// `self.last` must be non-null.
    unsafe fn pop_last(&mut self) {
        // SAFETY: `last` is a live node per the caller's contract; its bucket
        // and chain neighbours are live by the store invariants.
        unsafe {
            let node = self.last;
            self.index.remove(&(*node).key);
            let bucket = (*node).bucket;
            (*bucket).length -= 1;
            self.last = (*node).next;
            EntryNode::unlink(node);
            if (*bucket).length == 0 {
                Bucket::unlink(bucket);
                drop(Box::from_raw(bucket));
            }
            drop(Box::from_raw(node));
        }
    }

    /// Links a fresh key at use count 1 and indexes it.
    ///
    /// # Safety
    ///
    /// `key` must not be present in the index and the store must have spare
    /// capacity.
    unsafe fn link_new(&mut self, key: K, value: V) {
        let node = EntryNode::alloc(key.clone(), value);
        // SAFETY: `node` is freshly allocated; `last` and its bucket are live
        // whenever non-null.
        unsafe {
            if self.last.is_null() {
                (*node).bucket = Bucket::alloc(1, node);
                self.last = node;
            } else {
                let lowest = (*self.last).bucket;
                if (*lowest).used == 1 {
                    // join the existing ones-bucket as its newest member
                    (*node).bucket = lowest;
                    (*lowest).length += 1;
                    EntryNode::link_after(node, (*lowest).first);
                    (*lowest).first = node;
                } else {
                    // open a new lowest bucket in front of the chain
                    let bucket = Bucket::alloc(1, node);
                    (*node).bucket = bucket;
                    Bucket::link_before(bucket, lowest);
                    EntryNode::link_before(node, self.last);
                    self.last = node;
                }
            }
        }
        self.index.insert(key, node);
    }

    /// Moves `node` from its bucket into the next-higher one, creating that
    /// bucket if the chain skips the frequency.
    ///
    /// The promoted entry always becomes `first` of its new bucket, and
    /// `last` advances whenever the entry stops being the strictly
    /// lowest-frequency one. All relinking is a constant number of pointer
    /// updates.
    ///
    /// # Safety
    ///
    /// `node` must be a live member of this segment.
    unsafe fn promote(&mut self, node: *mut EntryNode<K, V>) {
        // SAFETY: `node`, its bucket, and their chain neighbours are live per
        // the store invariants; fresh buckets are linked before use.
        unsafe {
            let bucket = (*node).bucket;
            let used = (*bucket).used;
            (*bucket).length -= 1;

            let reuse = !(*bucket).next.is_null() && (*(*bucket).next).used == used + 1;
            if reuse {
                let target = (*bucket).next;
                if (*bucket).first == node {
                    (*bucket).first = (*node).prev;
                }
                if self.last == node {
                    self.last = (*node).next;
                }
                EntryNode::unlink(node);
                EntryNode::link_after(node, (*target).first);
                (*target).first = node;
                (*target).length += 1;
                (*node).bucket = target;
            } else if (*bucket).length == 0 {
                // sole member: the chain position is already correct, the
                // relabelled bucket slots in where the old one was
                let target = Bucket::alloc(used + 1, node);
                Bucket::link_after(target, bucket);
                (*node).bucket = target;
            } else {
                if (*bucket).first == node {
                    (*bucket).first = (*node).prev;
                }
                if self.last == node {
                    self.last = (*node).next;
                }
                let target = Bucket::alloc(used + 1, node);
                Bucket::link_after(target, bucket);
                EntryNode::unlink(node);
                EntryNode::link_after(node, (*bucket).first);
                (*node).bucket = target;
            }

            if (*bucket).length == 0 {
                Bucket::unlink(bucket);
                drop(Box::from_raw(bucket));
            }
        }
    }
}

impl<K, V, S> Drop for LfuSegment<K, V, S> {
    fn drop(&mut self) {
        // SAFETY: the segment exclusively owns every node and bucket
        // reachable from `last`; nothing else can observe them during drop.
        unsafe {
            let mut bucket = if self.last.is_null() {
                ptr::null_mut()
            } else {
                (*self.last).bucket
            };
            let mut node = self.last;
            while !node.is_null() {
                let next = (*node).next;
                drop(Box::from_raw(node));
                node = next;
            }
            while !bucket.is_null() {
                let next = (*bucket).next;
                drop(Box::from_raw(bucket));
                bucket = next;
            }
        }
    }
}

impl<K, V, S> fmt::Debug for LfuSegment<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfuSegment")
            .field("len", &self.index.len())
            .field("capacity", &self.capacity)
            .field("cleanup_size", &self.cleanup_size)
            .finish()
    }
}

/// A thread-safe LFU cache with batch eviction.
///
/// Entries are evicted least-frequently-used first, breaking ties by
/// evicting the oldest insertion at that frequency. Every operation runs
/// under one mutex, so concurrent callers observe a single serialization of
/// their operations and `get` of a just-completed `set` sees the new value.
///
/// Construction validates the [`LfuConfig`] sizing for the chosen namespace
/// and fails fast on invalid cleanup sizes. A namespace configured with
/// capacity 0 yields a permanently empty cache.
///
/// # Examples
///
/// ```
/// use todo_cache::{CacheNamespace, LfuCache, LfuConfig};
///
/// let mut config = LfuConfig::default();
/// config.capacities.insert(CacheNamespace::Todo, 2);
/// config.cleanup_sizes.insert(CacheNamespace::Todo, 1);
///
/// let cache: LfuCache<&str, u32> = LfuCache::new(&config, CacheNamespace::Todo).unwrap();
/// cache.set("a", 1);
/// cache.set("b", 2);
/// assert_eq!(cache.get(&"a"), Some(1)); // "a" now has the higher use count
///
/// cache.set("c", 3); // evicts "b"
/// assert_eq!(cache.get(&"b"), None);
/// assert_eq!(cache.get(&"a"), Some(1));
/// ```
pub struct LfuCache<K, V, S = DefaultHashBuilder> {
    segment: Mutex<LfuSegment<K, V, S>>,
}

impl<K: Hash + Eq + Clone, V: Clone> LfuCache<K, V> {
    /// Creates a cache sized by `config[namespace]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the namespace has a non-zero capacity
    /// and a missing or out-of-range cleanup size.
    pub fn new(config: &LfuConfig, namespace: CacheNamespace) -> Result<Self, ConfigError> {
        Self::with_hasher(config, namespace, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> LfuCache<K, V, S> {
    /// Creates a cache sized by `config[namespace]` with a custom hasher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the namespace has a non-zero capacity
    /// and a missing or out-of-range cleanup size.
    pub fn with_hasher(
        config: &LfuConfig,
        namespace: CacheNamespace,
        hash_builder: S,
    ) -> Result<Self, ConfigError> {
        let (capacity, cleanup_size) = config.validated(namespace)?;
        Ok(LfuCache {
            segment: Mutex::new(LfuSegment::with_hasher(capacity, cleanup_size, hash_builder)),
        })
    }

    /// Inserts or overwrites `key`.
    ///
    /// An existing key keeps its use count history and is promoted exactly
    /// as a `get` would promote it; a fresh key starts at use count 1 and
    /// may trigger a batch eviction first. Never fails.
    pub fn set(&self, key: K, value: V) {
        self.segment.lock().set(key, value);
    }

    /// Returns a clone of the value for `key`, promoting the entry.
    ///
    /// A miss returns `None` and changes nothing.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.segment.lock().get(key).cloned()
    }

    /// Removes `key` if present; absent keys are a no-op.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.segment.lock().remove(key);
    }

    /// Returns `key`'s current use count without promoting it.
    ///
    /// Diagnostic accessor: peeking is not a retrieval and leaves the
    /// frequency order untouched.
    pub fn use_count<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.segment.lock().use_count(key)
    }

    /// Returns the current number of cached entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.segment.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of simultaneously held entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.segment.lock().capacity()
    }

    /// Returns the number of entries evicted per batch.
    #[inline]
    pub fn cleanup_size(&self) -> usize {
        self.segment.lock().cleanup_size()
    }
}

impl<K: Hash + Eq + Clone, V, S: BuildHasher> fmt::Debug for LfuCache<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segment = self.segment.lock();
        f.debug_struct("LfuCache")
            .field("len", &segment.len())
            .field("capacity", &segment.capacity())
            .field("cleanup_size", &segment.cleanup_size())
            .finish()
    }
}
