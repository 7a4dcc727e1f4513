use std::future::Future;

use crate::changes::Changes;
use crate::condition::Condition;
use crate::context::QueryCtx;
use crate::entity::Entity;
use crate::error::DataError;
use crate::page::QueryResult;
use crate::request::QueryRequest;
use crate::spec::FilterSpec;
use crate::value::Value;

/// Per-call options for read operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions<'a> {
    /// Replaces the repository's own FilterSpec for this call.
    pub spec: Option<&'a FilterSpec>,
    /// Include soft-deleted rows.
    pub unscoped: bool,
}

impl<'a> QueryOptions<'a> {
    pub fn with_spec(spec: &'a FilterSpec) -> Self {
        Self {
            spec: Some(spec),
            unscoped: false,
        }
    }

    pub fn unscoped(mut self) -> Self {
        self.unscoped = true;
        self
    }
}

/// Generic async repository contract.
///
/// Uses RPITIT (return-position `impl Trait` in traits), no `async-trait` needed.
/// Every method that reaches the backend takes a [`QueryCtx`] and fails with
/// `Cancelled` / `DeadlineExceeded` when it fires. Single-record reads and
/// identity updates report "nothing matched" as `None`/`false`, never as an
/// error.
pub trait Repository<T: Entity>: Send + Sync {
    /// Insert and return the identity of the new row.
    fn create(&self, cx: &QueryCtx, entity: &T) -> impl Future<Output = Result<T::Id, DataError>> + Send;

    /// Insert all entities in one transaction.
    fn create_many(&self, cx: &QueryCtx, entities: &[T]) -> impl Future<Output = Result<Vec<T::Id>, DataError>> + Send;

    /// Update every live row matching `cond`; returns the affected count.
    fn update(&self, cx: &QueryCtx, cond: &Condition, changes: &Changes) -> impl Future<Output = Result<u64, DataError>> + Send;

    /// Update one row and return its fresh state, `None` if absent.
    fn update_by_id(&self, cx: &QueryCtx, id: &T::Id, changes: &Changes) -> impl Future<Output = Result<Option<T>, DataError>> + Send;

    /// Ordered, unpaginated listing.
    fn find_all(
        &self,
        cx: &QueryCtx,
        cond: Option<&Condition>,
        request: &QueryRequest,
        options: QueryOptions<'_>,
    ) -> impl Future<Output = Result<Vec<T>, DataError>> + Send;

    /// Count-then-fetch listing. The count and the page are separate round
    /// trips and may disagree under concurrent writes.
    fn find_all_paged(
        &self,
        cx: &QueryCtx,
        cond: Option<&Condition>,
        request: &QueryRequest,
        options: QueryOptions<'_>,
    ) -> impl Future<Output = Result<QueryResult<T>, DataError>> + Send;

    fn find_one(
        &self,
        cx: &QueryCtx,
        cond: &Condition,
        options: QueryOptions<'_>,
    ) -> impl Future<Output = Result<Option<T>, DataError>> + Send;

    fn find_by_id(
        &self,
        cx: &QueryCtx,
        id: &T::Id,
        options: QueryOptions<'_>,
    ) -> impl Future<Output = Result<Option<T>, DataError>> + Send;

    fn find_by_ids(
        &self,
        cx: &QueryCtx,
        ids: &[T::Id],
        options: QueryOptions<'_>,
    ) -> impl Future<Output = Result<Vec<T>, DataError>> + Send;

    /// Soft delete when the entity has a marker column, hard delete otherwise.
    fn delete(&self, cx: &QueryCtx, cond: &Condition) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn delete_by_id(&self, cx: &QueryCtx, id: &T::Id) -> impl Future<Output = Result<bool, DataError>> + Send;

    fn delete_by_ids(&self, cx: &QueryCtx, ids: &[T::Id]) -> impl Future<Output = Result<u64, DataError>> + Send;

    /// Hard delete regardless of soft-delete configuration.
    fn purge(&self, cx: &QueryCtx, cond: &Condition) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn count(&self, cx: &QueryCtx, cond: Option<&Condition>) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn exists(&self, cx: &QueryCtx, cond: &Condition) -> impl Future<Output = Result<bool, DataError>> + Send;

    fn exists_by_id(&self, cx: &QueryCtx, id: &T::Id) -> impl Future<Output = Result<bool, DataError>> + Send;

    /// One column of every matching row.
    fn pluck(&self, cx: &QueryCtx, column: &str, cond: Option<&Condition>) -> impl Future<Output = Result<Vec<Value>, DataError>> + Send;

    /// Compile `request` with the repository's (or the overriding) FilterSpec.
    fn compile(&self, request: &QueryRequest, options: QueryOptions<'_>) -> Condition;

    /// Atomic insert-or-update; returns the identity of the stored row,
    /// which on a non-id conflict is the existing row's id, not the payload's.
    fn upsert(
        &self,
        cx: &QueryCtx,
        entity: &T,
        conflict: &[&str],
        update: &[&str],
    ) -> impl Future<Output = Result<T::Id, DataError>> + Send;

    /// Atomic find-or-insert; the flag is `true` when the row was created.
    ///
    /// Fails, writing nothing, when `entity` does not itself satisfy `cond`.
    /// Concurrent callers insert at most once on SQLite. On Postgres and
    /// MySQL that holds only when a unique constraint covers `cond`.
    fn find_or_create(
        &self,
        cx: &QueryCtx,
        cond: &Condition,
        entity: &T,
        options: QueryOptions<'_>,
    ) -> impl Future<Output = Result<(T, bool), DataError>> + Send;

    fn restore_by_id(&self, cx: &QueryCtx, id: &T::Id) -> impl Future<Output = Result<bool, DataError>> + Send;

    fn restore(&self, cx: &QueryCtx, cond: &Condition) -> impl Future<Output = Result<u64, DataError>> + Send;
}
