//! Repository seam for todo persistence.
//!
//! The coherence layer talks to storage exclusively through this trait.
//! Every operation is scoped to an owner, is fallible, and may be abandoned
//! mid-flight by cancellation; the service only acts on the cache after a
//! call has returned successfully. Mutations report the numeric ids they
//! affected so the service can compute the invalidation set.

use async_trait::async_trait;
use thiserror::Error;

use crate::todo::model::{Todo, TodoPatch, TodoRequest};

/// Errors surfaced by repository implementations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The addressed record does not exist for this owner.
    #[error("record not found")]
    NotFound,

    /// The backing store failed; the message is backend-specific.
    #[error("repository backend failure: {0}")]
    Backend(String),
}

/// Storage operations the coherence layer depends on.
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// Reads one todo of `owner` by numeric id.
    async fn get_by_id(&self, owner: u64, id: u64) -> Result<Todo, RepositoryError>;

    /// Reads `owner`'s todos with the given completion flag, ordered.
    async fn get_by_completion(
        &self,
        owner: u64,
        completed: bool,
    ) -> Result<Vec<Todo>, RepositoryError>;

    /// Reads all of `owner`'s todos, ordered.
    async fn get_all(&self, owner: u64) -> Result<Vec<Todo>, RepositoryError>;

    /// Creates a todo for `owner`, returning the assigned id.
    async fn create(&self, owner: u64, request: TodoRequest) -> Result<u64, RepositoryError>;

    /// Replaces the todo `id` of `owner`, returning the affected id.
    async fn update_by_id(
        &self,
        owner: u64,
        id: u64,
        request: TodoRequest,
    ) -> Result<u64, RepositoryError>;

    /// Partially updates the todo `id` of `owner`, returning the affected id.
    async fn patch_by_id(
        &self,
        owner: u64,
        id: u64,
        patch: TodoPatch,
    ) -> Result<u64, RepositoryError>;

    /// Deletes the todo `id` of `owner`, returning the affected id.
    async fn delete_by_id(&self, owner: u64, id: u64) -> Result<u64, RepositoryError>;

    /// Deletes every todo of `owner` with the given completion flag,
    /// returning the affected ids.
    async fn delete_by_completion(
        &self,
        owner: u64,
        completed: bool,
    ) -> Result<Vec<u64>, RepositoryError>;
}
