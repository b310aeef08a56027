//! Intrusive node types for the LFU store.
//!
//! The store is a cyclic pointer graph built from two node kinds:
//!
//! - [`EntryNode`]: one cached key/value pair, linked into a single global
//!   doubly-linked chain that runs from the least-frequently-used entry to
//!   the most-frequently-used one.
//! - [`Bucket`]: one frequency class, linked into its own doubly-linked
//!   chain ascending in `used`. A bucket does not own its members; it marks
//!   a segment of the entry chain and remembers the segment's most recent
//!   insertion (`first`).
//!
//! ```text
//!  bucket chain:   [used=1] ◀──▶ [used=3] ◀──▶ [used=8]
//!                    │ first        │ first       │ first
//!  entry chain:    e₇ ◀▶ e₄ ◀▶ e₉ ◀▶ e₂ ◀▶ e₁ ◀▶ e₃
//!                  ▲ store.last            (old → new within a bucket)
//! ```
//!
//! Nodes are heap-allocated with `Box::into_raw` and freed with
//! `Box::from_raw`; the store is the only owner of every node. The helpers
//! here perform the constant-time splice operations and nothing else;
//! maintaining `length`, `first`, and the store's `last` pointer is the
//! caller's job.
//!
//! This module is internal infrastructure: it exposes raw pointer operations
//! that require careful invariant maintenance. Use
//! [`LfuCache`](crate::LfuCache) instead.

use core::ptr;

/// A cached key/value pair, member of exactly one [`Bucket`].
pub(crate) struct EntryNode<K, V> {
    /// The cached key. A clone also lives in the store's index.
    pub(crate) key: K,
    /// The cached value.
    pub(crate) value: V,
    /// The frequency bucket this entry currently belongs to.
    pub(crate) bucket: *mut Bucket<K, V>,
    /// Chain neighbour on the eviction (lower-frequency, older) side.
    pub(crate) prev: *mut EntryNode<K, V>,
    /// Chain neighbour on the higher-frequency, newer side.
    pub(crate) next: *mut EntryNode<K, V>,
}

impl<K, V> EntryNode<K, V> {
    /// Allocates a detached node for `key` / `value`.
    pub(crate) fn alloc(key: K, value: V) -> *mut Self {
        Box::into_raw(Box::new(EntryNode {
            key,
            value,
            bucket: ptr::null_mut(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }))
    }

    /// Splices a detached `node` into the entry chain right after `after`.
    ///
    /// # Safety
    ///
    /// `node` must be valid and not currently linked; `after` must be a
    /// valid chain member.
    pub(crate) unsafe fn link_after(node: *mut Self, after: *mut Self) {
        // SAFETY: both pointers are valid per the caller's contract.
        unsafe {
            (*node).prev = after;
            (*node).next = (*after).next;
            if !(*node).next.is_null() {
                (*(*node).next).prev = node;
            }
            (*after).next = node;
        }
    }

    /// Splices a detached `node` into the entry chain right before `before`.
    ///
    /// # Safety
    ///
    /// `node` must be valid and not currently linked; `before` must be a
    /// valid chain member.
    pub(crate) unsafe fn link_before(node: *mut Self, before: *mut Self) {
        // SAFETY: both pointers are valid per the caller's contract.
        unsafe {
            (*node).next = before;
            (*node).prev = (*before).prev;
            if !(*node).prev.is_null() {
                (*(*node).prev).next = node;
            }
            (*before).prev = node;
        }
    }

    /// Detaches `node` from the entry chain, healing its neighbours.
    ///
    /// # Safety
    ///
    /// `node` must be a valid, currently linked chain member.
    pub(crate) unsafe fn unlink(node: *mut Self) {
        // SAFETY: node and its non-null neighbours are valid chain members.
        unsafe {
            if !(*node).prev.is_null() {
                (*(*node).prev).next = (*node).next;
            }
            if !(*node).next.is_null() {
                (*(*node).next).prev = (*node).prev;
            }
            (*node).prev = ptr::null_mut();
            (*node).next = ptr::null_mut();
        }
    }
}

/// A frequency class: all entries retrieved exactly `used` times.
pub(crate) struct Bucket<K, V> {
    /// The use count shared by every member.
    pub(crate) used: u64,
    /// Number of members. A bucket whose length drops to zero is freed.
    pub(crate) length: usize,
    /// The member most recently inserted into this bucket.
    pub(crate) first: *mut EntryNode<K, V>,
    /// Next-lower-frequency bucket.
    pub(crate) prev: *mut Bucket<K, V>,
    /// Next-higher-frequency bucket.
    pub(crate) next: *mut Bucket<K, V>,
}

impl<K, V> Bucket<K, V> {
    /// Allocates a detached bucket holding only `first`.
    pub(crate) fn alloc(used: u64, first: *mut EntryNode<K, V>) -> *mut Self {
        Box::into_raw(Box::new(Bucket {
            used,
            length: 1,
            first,
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }))
    }

    /// Splices a detached `bucket` into the bucket chain right after `after`.
    ///
    /// # Safety
    ///
    /// `bucket` must be valid and not currently linked; `after` must be a
    /// valid chain member.
    pub(crate) unsafe fn link_after(bucket: *mut Self, after: *mut Self) {
        // SAFETY: both pointers are valid per the caller's contract.
        unsafe {
            (*bucket).prev = after;
            (*bucket).next = (*after).next;
            if !(*bucket).next.is_null() {
                (*(*bucket).next).prev = bucket;
            }
            (*after).next = bucket;
        }
    }

    /// Splices a detached `bucket` into the bucket chain right before `before`.
    ///
    /// # Safety
    ///
    /// `bucket` must be valid and not currently linked; `before` must be a
    /// valid chain member.
    pub(crate) unsafe fn link_before(bucket: *mut Self, before: *mut Self) {
        // SAFETY: both pointers are valid per the caller's contract.
        unsafe {
            (*bucket).next = before;
            (*bucket).prev = (*before).prev;
            if !(*bucket).prev.is_null() {
                (*(*bucket).prev).next = bucket;
            }
            (*before).prev = bucket;
        }
    }

    /// Detaches `bucket` from the bucket chain, healing its neighbours.
    ///
    /// # Safety
    ///
    /// `bucket` must be a valid, currently linked chain member.
    pub(crate) unsafe fn unlink(bucket: *mut Self) {
        // SAFETY: bucket and its non-null neighbours are valid chain members.
        unsafe {
            if !(*bucket).prev.is_null() {
                (*(*bucket).prev).next = (*bucket).next;
            }
            if !(*bucket).next.is_null() {
                (*(*bucket).next).prev = (*bucket).prev;
            }
            (*bucket).prev = ptr::null_mut();
            (*bucket).next = ptr::null_mut();
        }
    }
}
