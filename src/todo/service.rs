//! Cache-coherent todo read/write orchestration.
//!
//! [`CachedTodoService`] owns the todo namespace of the LFU store and is the
//! only code that touches it. Reads go cache-first; writes go repository-
//! first and evict the owner's invalidation set only after the repository
//! acknowledges the mutation, which is what makes an acknowledged write
//! impossible to shadow with a pre-mutation cached value.
//!
//! Cancellation is honoured at the repository boundary: a token observed
//! cancelled before or during the repository call aborts the operation with
//! [`TodoError::Cancelled`] and leaves the cache untouched. Once a mutation
//! has succeeded, the eviction sweep runs synchronously; there is no await
//! point a cancellation could split it away from.

use core::fmt;
use core::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::lfu::LfuCache;
use crate::todo::codec::{CodecError, IdCodec};
use crate::todo::key::{TodoCacheKey, TodoCacheValue};
use crate::todo::model::{Todo, TodoPatch, TodoRequest, TodoView};
use crate::todo::repository::{RepositoryError, TodoRepository};

/// Errors surfaced by the todo service operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TodoError {
    /// Point read addressed a todo that does not exist for this owner.
    #[error("todo does not exist")]
    TodoNotFound,

    /// Create/update payload carried an empty title.
    #[error("todo title must not be empty")]
    EmptyTitle,

    /// A wire-form id failed to encode or decode.
    #[error("id codec failure: {0}")]
    Codec(#[from] CodecError),

    /// The repository rejected or failed the operation.
    #[error("repository operation failed: {0}")]
    Repository(#[from] RepositoryError),

    /// The caller's cancellation token fired before the repository call
    /// completed.
    #[error("operation was cancelled")]
    Cancelled,
}

/// Todo orchestration backed by a repository and memoized in an LFU cache.
pub struct CachedTodoService<R, C> {
    cache: LfuCache<TodoCacheKey, TodoCacheValue>,
    repository: R,
    codec: C,
}

impl<R: TodoRepository, C: IdCodec> CachedTodoService<R, C> {
    /// Assembles the service from its collaborators.
    pub fn new(cache: LfuCache<TodoCacheKey, TodoCacheValue>, repository: R, codec: C) -> Self {
        CachedTodoService {
            cache,
            repository,
            codec,
        }
    }

    /// Creates a todo for `owner`. New todos always start incomplete.
    ///
    /// # Errors
    ///
    /// [`TodoError::EmptyTitle`] on an empty title, repository and
    /// cancellation errors otherwise.
    pub async fn create(
        &self,
        owner: u64,
        request: TodoRequest,
        cancel: &CancellationToken,
    ) -> Result<(), TodoError> {
        let request = validated_request(request)?;
        self.guarded(cancel, self.repository.create(owner, request))
            .await?;
        self.invalidate(owner, &[]);
        Ok(())
    }

    /// Reads one todo by its wire-form id.
    ///
    /// # Errors
    ///
    /// [`TodoError::TodoNotFound`] when the repository has no such record;
    /// the miss is not cached and nothing is evicted.
    pub async fn get_by_id(
        &self,
        owner: u64,
        todo_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TodoView, TodoError> {
        let id = self.codec.decode(todo_id)?;
        let key = TodoCacheKey::by_id(owner, id);

        if let Some(TodoCacheValue::Single(view)) = self.cache.get(&key) {
            debug!(owner, id, "todo point read served from cache");
            return Ok(view);
        }

        let todo = match self
            .guarded(cancel, self.repository.get_by_id(owner, id))
            .await
        {
            Err(TodoError::Repository(RepositoryError::NotFound)) => {
                return Err(TodoError::TodoNotFound)
            }
            other => other?,
        };

        // the wire already carries the obfuscated id, no re-encoding needed
        let view = TodoView {
            id: todo_id.to_owned(),
            title: todo.title,
            description: todo.description,
            completed: todo.completed,
        };
        self.cache.set(key, TodoCacheValue::Single(view.clone()));
        Ok(view)
    }

    /// Reads `owner`'s todos with the given completion flag.
    ///
    /// # Errors
    ///
    /// Repository, codec and cancellation errors.
    pub async fn get_by_completion(
        &self,
        owner: u64,
        completed: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<TodoView>, TodoError> {
        self.list_read(
            TodoCacheKey::by_completion(owner, completed),
            cancel,
            self.repository.get_by_completion(owner, completed),
        )
        .await
    }

    /// Reads all of `owner`'s todos.
    ///
    /// # Errors
    ///
    /// Repository, codec and cancellation errors.
    pub async fn get_all(
        &self,
        owner: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<TodoView>, TodoError> {
        self.list_read(
            TodoCacheKey::all(owner),
            cancel,
            self.repository.get_all(owner),
        )
        .await
    }

    /// Replaces the todo addressed by `todo_id`.
    ///
    /// # Errors
    ///
    /// [`TodoError::EmptyTitle`] on an empty title, repository and
    /// cancellation errors otherwise. On any error the cache is untouched.
    pub async fn update_by_id(
        &self,
        owner: u64,
        todo_id: &str,
        request: TodoRequest,
        cancel: &CancellationToken,
    ) -> Result<(), TodoError> {
        let request = validated_request(request)?;
        let id = self.codec.decode(todo_id)?;
        let affected = self
            .guarded(cancel, self.repository.update_by_id(owner, id, request))
            .await?;
        self.invalidate(owner, &[affected]);
        Ok(())
    }

    /// Partially updates the todo addressed by `todo_id`.
    ///
    /// A patch with every field absent changes nothing and returns without
    /// touching the repository or the cache.
    ///
    /// # Errors
    ///
    /// Repository, codec and cancellation errors. On any error the cache is
    /// untouched.
    pub async fn patch_by_id(
        &self,
        owner: u64,
        todo_id: &str,
        patch: TodoPatch,
        cancel: &CancellationToken,
    ) -> Result<(), TodoError> {
        let id = self.codec.decode(todo_id)?;
        if patch.is_empty() {
            debug!(owner, id, "empty patch, nothing to apply");
            return Ok(());
        }
        let affected = self
            .guarded(cancel, self.repository.patch_by_id(owner, id, patch))
            .await?;
        self.invalidate(owner, &[affected]);
        Ok(())
    }

    /// Deletes the todo addressed by `todo_id`.
    ///
    /// # Errors
    ///
    /// Repository, codec and cancellation errors. On any error the cache is
    /// untouched.
    pub async fn delete_by_id(
        &self,
        owner: u64,
        todo_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TodoError> {
        let id = self.codec.decode(todo_id)?;
        let affected = self
            .guarded(cancel, self.repository.delete_by_id(owner, id))
            .await?;
        self.invalidate(owner, &[affected]);
        Ok(())
    }

    /// Deletes every todo of `owner` with the given completion flag.
    ///
    /// # Errors
    ///
    /// Repository and cancellation errors. On any error the cache is
    /// untouched.
    pub async fn delete_by_completion(
        &self,
        owner: u64,
        completed: bool,
        cancel: &CancellationToken,
    ) -> Result<(), TodoError> {
        let affected = self
            .guarded(cancel, self.repository.delete_by_completion(owner, completed))
            .await?;
        self.invalidate(owner, &affected);
        Ok(())
    }

    /// Shared read path for the two list families.
    async fn list_read(
        &self,
        key: TodoCacheKey,
        cancel: &CancellationToken,
        fetch: impl Future<Output = Result<Vec<Todo>, RepositoryError>>,
    ) -> Result<Vec<TodoView>, TodoError> {
        if let Some(TodoCacheValue::List(views)) = self.cache.get(&key) {
            debug!(owner = key.owner, scope = ?key.scope, "todo list read served from cache");
            return Ok(views);
        }

        let todos = self.guarded(cancel, fetch).await?;
        let views = self.project(todos)?;
        self.cache.set(key, TodoCacheValue::List(views.clone()));
        Ok(views)
    }

    /// Runs a repository call unless the token has fired, aborting it on
    /// cancellation. Nothing after a successful return can be cancelled.
    async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        operation: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, TodoError> {
        if cancel.is_cancelled() {
            return Err(TodoError::Cancelled);
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TodoError::Cancelled),
            result = operation => result.map_err(TodoError::from),
        }
    }

    /// Projects repository records into wire-form views, encoding each id
    /// exactly once.
    fn project(&self, todos: Vec<Todo>) -> Result<Vec<TodoView>, TodoError> {
        todos
            .into_iter()
            .map(|todo| {
                Ok(TodoView {
                    id: self.codec.encode(todo.id)?,
                    title: todo.title,
                    description: todo.description,
                    completed: todo.completed,
                })
            })
            .collect()
    }

    /// Evicts the owner's invalidation set after an acknowledged mutation.
    fn invalidate(&self, owner: u64, affected_ids: &[u64]) {
        let keys = TodoCacheKey::invalidation_set(owner, affected_ids);
        debug!(owner, evicted = keys.len(), "evicting todo cache keys after mutation");
        for key in &keys {
            self.cache.remove(key);
        }
    }
}

impl<R, C> fmt::Debug for CachedTodoService<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedTodoService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Checks a create/update payload; new and replaced todos start incomplete.
fn validated_request(request: TodoRequest) -> Result<TodoRequest, TodoError> {
    if request.title.is_empty() {
        return Err(TodoError::EmptyTitle);
    }
    Ok(TodoRequest {
        completed: false,
        ..request
    })
}
