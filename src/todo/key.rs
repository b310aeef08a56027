//! Cache keying scheme and invalidation sets.
//!
//! Every cached read is addressed by `(owner, scope)`: the owning user plus
//! a discriminant naming one of the three read families. Keeping the scope a
//! tagged union means a point read can never collide with a list read, and
//! cached values need no downcasting on a hit.

use crate::todo::model::TodoView;

/// Discriminant naming one read family of a single owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TodoScope {
    /// Point read of one todo by numeric id.
    ById(u64),
    /// List read of todos filtered by completion flag.
    ByCompletion(bool),
    /// List read of every todo the owner has.
    All,
}

/// Cache key: one read family of one owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TodoCacheKey {
    /// The user whose data is cached.
    pub owner: u64,
    /// Which of the owner's read families this key addresses.
    pub scope: TodoScope,
}

impl TodoCacheKey {
    /// Key for a point read of `id`.
    pub fn by_id(owner: u64, id: u64) -> Self {
        TodoCacheKey {
            owner,
            scope: TodoScope::ById(id),
        }
    }

    /// Key for a list read filtered by `completed`.
    pub fn by_completion(owner: u64, completed: bool) -> Self {
        TodoCacheKey {
            owner,
            scope: TodoScope::ByCompletion(completed),
        }
    }

    /// Key for the list-all read.
    pub fn all(owner: u64) -> Self {
        TodoCacheKey {
            owner,
            scope: TodoScope::All,
        }
    }

    /// The keys a mutation touching `affected_ids` must evict.
    ///
    /// Every mutation invalidates the three list keys; mutations with known
    /// affected ids additionally invalidate each point-read key. The set is
    /// a superset of what the mutation strictly changed: over-eviction
    /// costs a repository round trip, under-eviction would serve stale data.
    pub fn invalidation_set(owner: u64, affected_ids: &[u64]) -> Vec<TodoCacheKey> {
        let mut keys = Vec::with_capacity(3 + affected_ids.len());
        keys.push(TodoCacheKey::by_completion(owner, true));
        keys.push(TodoCacheKey::by_completion(owner, false));
        keys.push(TodoCacheKey::all(owner));
        keys.extend(affected_ids.iter().map(|&id| TodoCacheKey::by_id(owner, id)));
        keys
    }
}

/// Cache value: a single projected view or an ordered list of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TodoCacheValue {
    /// Result of a point read.
    Single(TodoView),
    /// Result of a list read, in repository order.
    List(Vec<TodoView>),
}
