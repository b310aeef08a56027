//! Coherence tests for the cached todo service.
//!
//! A fake in-memory repository with per-family call counters stands in for
//! the real storage. The counters are how the tests distinguish cache hits
//! (no repository traffic) from fills and invalidations (fresh traffic).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use todo_cache::{
    CacheNamespace, CachedTodoService, CodecError, IdCodec, LfuCache, LfuConfig, RepositoryError,
    Todo, TodoError, TodoPatch, TodoRepository, TodoRequest,
};

// ============================================================================
// FIXTURES
// ============================================================================

#[derive(Default)]
struct RepoState {
    todos: Mutex<Vec<(u64, Todo)>>,
    next_id: AtomicU64,
    fail: AtomicBool,
    point_reads: AtomicUsize,
    list_reads: AtomicUsize,
    mutations: AtomicUsize,
}

/// Shared-handle fake repository; clones observe the same state.
#[derive(Clone, Default)]
struct FakeRepository {
    state: Arc<RepoState>,
}

impl FakeRepository {
    fn seeded(todos: Vec<(u64, Todo)>) -> Self {
        let max_id = todos.iter().map(|(_, t)| t.id).max().unwrap_or(0);
        let repo = FakeRepository::default();
        repo.state.next_id.store(max_id + 1, Ordering::SeqCst);
        *repo.state.todos.lock() = todos;
        repo
    }

    fn set_failing(&self, failing: bool) {
        self.state.fail.store(failing, Ordering::SeqCst);
    }

    fn point_reads(&self) -> usize {
        self.state.point_reads.load(Ordering::SeqCst)
    }

    fn list_reads(&self) -> usize {
        self.state.list_reads.load(Ordering::SeqCst)
    }

    fn mutations(&self) -> usize {
        self.state.mutations.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.state.fail.load(Ordering::SeqCst) {
            Err(RepositoryError::Backend("storage offline".to_owned()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TodoRepository for FakeRepository {
    async fn get_by_id(&self, owner: u64, id: u64) -> Result<Todo, RepositoryError> {
        self.state.point_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.state
            .todos
            .lock()
            .iter()
            .find(|(o, t)| *o == owner && t.id == id)
            .map(|(_, t)| t.clone())
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_completion(
        &self,
        owner: u64,
        completed: bool,
    ) -> Result<Vec<Todo>, RepositoryError> {
        self.state.list_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self
            .state
            .todos
            .lock()
            .iter()
            .filter(|(o, t)| *o == owner && t.completed == completed)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn get_all(&self, owner: u64) -> Result<Vec<Todo>, RepositoryError> {
        self.state.list_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self
            .state
            .todos
            .lock()
            .iter()
            .filter(|(o, _)| *o == owner)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn create(&self, owner: u64, request: TodoRequest) -> Result<u64, RepositoryError> {
        self.state.mutations.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state.todos.lock().push((
            owner,
            Todo {
                id,
                title: request.title,
                description: request.description,
                completed: request.completed,
            },
        ));
        Ok(id)
    }

    async fn update_by_id(
        &self,
        owner: u64,
        id: u64,
        request: TodoRequest,
    ) -> Result<u64, RepositoryError> {
        self.state.mutations.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut todos = self.state.todos.lock();
        let (_, todo) = todos
            .iter_mut()
            .find(|(o, t)| *o == owner && t.id == id)
            .ok_or(RepositoryError::NotFound)?;
        todo.title = request.title;
        todo.description = request.description;
        todo.completed = request.completed;
        Ok(id)
    }

    async fn patch_by_id(
        &self,
        owner: u64,
        id: u64,
        patch: TodoPatch,
    ) -> Result<u64, RepositoryError> {
        self.state.mutations.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut todos = self.state.todos.lock();
        let (_, todo) = todos
            .iter_mut()
            .find(|(o, t)| *o == owner && t.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(title) = patch.title {
            todo.title = title;
        }
        if let Some(description) = patch.description {
            todo.description = description;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }
        Ok(id)
    }

    async fn delete_by_id(&self, owner: u64, id: u64) -> Result<u64, RepositoryError> {
        self.state.mutations.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut todos = self.state.todos.lock();
        let position = todos
            .iter()
            .position(|(o, t)| *o == owner && t.id == id)
            .ok_or(RepositoryError::NotFound)?;
        todos.remove(position);
        Ok(id)
    }

    async fn delete_by_completion(
        &self,
        owner: u64,
        completed: bool,
    ) -> Result<Vec<u64>, RepositoryError> {
        self.state.mutations.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut todos = self.state.todos.lock();
        let affected: Vec<u64> = todos
            .iter()
            .filter(|(o, t)| *o == owner && t.completed == completed)
            .map(|(_, t)| t.id)
            .collect();
        todos.retain(|(o, t)| !(*o == owner && t.completed == completed));
        Ok(affected)
    }
}

/// Wire-form codec for tests: `42` encodes to `"t42"`.
#[derive(Clone, Copy, Debug, Default)]
struct PrefixCodec;

impl IdCodec for PrefixCodec {
    fn encode(&self, id: u64) -> Result<String, CodecError> {
        Ok(format!("t{id}"))
    }

    fn decode(&self, encoded: &str) -> Result<u64, CodecError> {
        encoded
            .strip_prefix('t')
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| CodecError::Malformed(encoded.to_owned()))
    }
}

fn todo(id: u64, title: &str, completed: bool) -> Todo {
    Todo {
        id,
        title: title.to_owned(),
        description: format!("about {title}"),
        completed,
    }
}

fn request(title: &str) -> TodoRequest {
    TodoRequest {
        title: title.to_owned(),
        description: String::new(),
        completed: false,
    }
}

fn service_over(
    repo: &FakeRepository,
) -> CachedTodoService<FakeRepository, PrefixCodec> {
    let mut config = LfuConfig::default();
    config.capacities.insert(CacheNamespace::Todo, 64);
    config.cleanup_sizes.insert(CacheNamespace::Todo, 8);
    let cache = LfuCache::new(&config, CacheNamespace::Todo).unwrap();
    CachedTodoService::new(cache, repo.clone(), PrefixCodec)
}

const OWNER: u64 = 7;

// ============================================================================
// READ PATH
// ============================================================================

#[tokio::test]
async fn point_read_fills_cache_once() {
    let repo = FakeRepository::seeded(vec![(OWNER, todo(1, "laundry", false))]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    let first = service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    assert_eq!(first.id, "t1");
    assert_eq!(first.title, "laundry");
    assert_eq!(repo.point_reads(), 1);

    let second = service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(repo.point_reads(), 1, "second read must be served from cache");
}

#[tokio::test]
async fn list_reads_fill_once_and_carry_encoded_ids() {
    let repo = FakeRepository::seeded(vec![
        (OWNER, todo(1, "laundry", false)),
        (OWNER, todo(2, "dishes", true)),
        (OWNER, todo(3, "groceries", false)),
    ]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    let all = service.get_all(OWNER, &cancel).await.unwrap();
    assert_eq!(
        all.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
        ["t1", "t2", "t3"]
    );

    let open = service.get_by_completion(OWNER, false, &cancel).await.unwrap();
    assert_eq!(
        open.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
        ["t1", "t3"]
    );
    assert_eq!(repo.list_reads(), 2);

    service.get_all(OWNER, &cancel).await.unwrap();
    service.get_by_completion(OWNER, false, &cancel).await.unwrap();
    assert_eq!(repo.list_reads(), 2, "repeat list reads must hit the cache");
}

#[tokio::test]
async fn missing_todo_is_a_sentinel_and_never_cached() {
    let repo = FakeRepository::seeded(vec![]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    for attempt in 1..=2 {
        let err = service.get_by_id(OWNER, "t9", &cancel).await.unwrap_err();
        assert_eq!(err, TodoError::TodoNotFound);
        assert_eq!(repo.point_reads(), attempt, "misses must not be cached");
    }
}

#[tokio::test]
async fn malformed_wire_id_never_reaches_repository() {
    let repo = FakeRepository::seeded(vec![]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    let err = service.get_by_id(OWNER, "bogus", &cancel).await.unwrap_err();
    assert!(matches!(err, TodoError::Codec(_)));
    assert_eq!(repo.point_reads(), 0);
}

#[tokio::test]
async fn owners_do_not_share_cache_entries() {
    let repo = FakeRepository::seeded(vec![
        (OWNER, todo(1, "mine", false)),
        (OWNER + 1, todo(2, "theirs", false)),
    ]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    service.get_all(OWNER, &cancel).await.unwrap();
    let other = service.get_all(OWNER + 1, &cancel).await.unwrap();
    assert_eq!(repo.list_reads(), 2);
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].id, "t2");
}

// ============================================================================
// WRITE PATH / COHERENCE
// ============================================================================

#[tokio::test]
async fn update_is_visible_to_every_read_family() {
    let repo = FakeRepository::seeded(vec![(OWNER, todo(1, "draft", false))]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    // warm every read family
    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    service.get_all(OWNER, &cancel).await.unwrap();
    service.get_by_completion(OWNER, false, &cancel).await.unwrap();
    let (points, lists) = (repo.point_reads(), repo.list_reads());

    service
        .update_by_id(OWNER, "t1", request("final"), &cancel)
        .await
        .unwrap();

    let fresh = service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    assert_eq!(fresh.title, "final");
    assert_eq!(repo.point_reads(), points + 1, "point key must be evicted");

    let all = service.get_all(OWNER, &cancel).await.unwrap();
    assert_eq!(all[0].title, "final");
    let open = service.get_by_completion(OWNER, false, &cancel).await.unwrap();
    assert_eq!(open[0].title, "final");
    assert_eq!(repo.list_reads(), lists + 2, "list keys must be evicted");
}

#[tokio::test]
async fn patch_invalidates_like_update() {
    let repo = FakeRepository::seeded(vec![(OWNER, todo(1, "chore", false))]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();

    let patch = TodoPatch {
        completed: Some(true),
        ..TodoPatch::default()
    };
    service.patch_by_id(OWNER, "t1", patch, &cancel).await.unwrap();

    let fresh = service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    assert!(fresh.completed);
    assert_eq!(fresh.title, "chore");
    assert_eq!(repo.point_reads(), 2);
}

#[tokio::test]
async fn empty_patch_touches_neither_repository_nor_cache() {
    let repo = FakeRepository::seeded(vec![(OWNER, todo(1, "untouched", false))]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();

    service
        .patch_by_id(OWNER, "t1", TodoPatch::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(repo.mutations(), 0, "a no-op patch must not reach the repository");

    // no invalidation happened, the point key is still cached
    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    assert_eq!(repo.point_reads(), 1);
}

#[tokio::test]
async fn create_evicts_list_keys_but_not_point_keys() {
    let repo = FakeRepository::seeded(vec![(OWNER, todo(1, "existing", false))]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    service.get_all(OWNER, &cancel).await.unwrap();

    service.create(OWNER, request("brand new"), &cancel).await.unwrap();

    let all = service.get_all(OWNER, &cancel).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(repo.list_reads(), 2, "list key must be refilled");

    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    assert_eq!(repo.point_reads(), 1, "point key must survive a create");
}

#[tokio::test]
async fn delete_by_id_evicts_the_deleted_key() {
    let repo = FakeRepository::seeded(vec![(OWNER, todo(1, "doomed", false))]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    service.delete_by_id(OWNER, "t1", &cancel).await.unwrap();

    let err = service.get_by_id(OWNER, "t1", &cancel).await.unwrap_err();
    assert_eq!(err, TodoError::TodoNotFound);
    assert_eq!(repo.point_reads(), 2, "deleted key must not be served from cache");
}

#[tokio::test]
async fn bulk_delete_evicts_only_affected_point_keys() {
    let repo = FakeRepository::seeded(vec![
        (OWNER, todo(1, "done a", true)),
        (OWNER, todo(2, "done b", true)),
        (OWNER, todo(3, "open", false)),
    ]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    service.get_by_id(OWNER, "t3", &cancel).await.unwrap();
    assert_eq!(repo.point_reads(), 2);

    service.delete_by_completion(OWNER, true, &cancel).await.unwrap();

    // the untouched todo is still served from cache
    service.get_by_id(OWNER, "t3", &cancel).await.unwrap();
    assert_eq!(repo.point_reads(), 2);

    // the deleted one was evicted and now misses for real
    let err = service.get_by_id(OWNER, "t1", &cancel).await.unwrap_err();
    assert_eq!(err, TodoError::TodoNotFound);
    assert_eq!(repo.point_reads(), 3);
}

#[tokio::test]
async fn failed_mutation_leaves_cache_untouched() {
    let repo = FakeRepository::seeded(vec![(OWNER, todo(1, "stable", false))]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    let cached = service.get_by_id(OWNER, "t1", &cancel).await.unwrap();

    repo.set_failing(true);
    let err = service
        .update_by_id(OWNER, "t1", request("never lands"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TodoError::Repository(RepositoryError::Backend(_))));
    repo.set_failing(false);

    // same cached value, no new repository traffic
    let again = service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    assert_eq!(again, cached);
    assert_eq!(repo.point_reads(), 1);
}

#[tokio::test]
async fn mutation_on_missing_id_does_not_invalidate() {
    let repo = FakeRepository::seeded(vec![(OWNER, todo(1, "kept", false))]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();

    let err = service.delete_by_id(OWNER, "t9", &cancel).await.unwrap_err();
    assert_eq!(err, TodoError::Repository(RepositoryError::NotFound));

    service.get_by_id(OWNER, "t1", &cancel).await.unwrap();
    assert_eq!(repo.point_reads(), 1, "failed delete must not evict");
}

// ============================================================================
// CANCELLATION AND VALIDATION
// ============================================================================

#[tokio::test]
async fn cancelled_token_aborts_before_the_repository() {
    let repo = FakeRepository::seeded(vec![(OWNER, todo(1, "still here", false))]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service.get_all(OWNER, &cancel).await.unwrap_err();
    assert_eq!(err, TodoError::Cancelled);
    assert_eq!(repo.list_reads(), 0);

    let err = service
        .update_by_id(OWNER, "t1", request("nope"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, TodoError::Cancelled);
    assert_eq!(repo.mutations(), 0);

    // the repository still holds the original record
    let fresh = CancellationToken::new();
    let view = service.get_by_id(OWNER, "t1", &fresh).await.unwrap();
    assert_eq!(view.title, "still here");
}

#[tokio::test]
async fn empty_title_never_reaches_the_repository() {
    let repo = FakeRepository::seeded(vec![]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    let err = service
        .create(OWNER, request(""), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, TodoError::EmptyTitle);

    let err = service
        .update_by_id(OWNER, "t1", request(""), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, TodoError::EmptyTitle);
    assert_eq!(repo.mutations(), 0);
}

#[tokio::test]
async fn created_todos_start_incomplete() {
    let repo = FakeRepository::seeded(vec![]);
    let service = service_over(&repo);
    let cancel = CancellationToken::new();

    let mut req = request("starts open");
    req.completed = true; // ignored: creation always starts incomplete
    service.create(OWNER, req, &cancel).await.unwrap();

    let open = service.get_by_completion(OWNER, false, &cancel).await.unwrap();
    assert_eq!(open.len(), 1);
    assert!(!open[0].completed);
}
