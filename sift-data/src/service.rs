use std::marker::PhantomData;

use crate::changes::Changes;
use crate::condition::Condition;
use crate::context::QueryCtx;
use crate::entity::Entity;
use crate::error::DataError;
use crate::page::QueryResult;
use crate::repository::{QueryOptions, Repository};
use crate::request::QueryRequest;
use crate::value::Value;

/// Thin service layer over a [`Repository`]: create-and-reload,
/// update-and-reload and request-driven listing.
///
/// ```ignore
/// let users = CrudService::new(SqlxRepository::<User>::new(pool, spec));
/// let page = users.list(&cx, None, &request, QueryOptions::default()).await?;
/// ```
pub struct CrudService<T, R> {
    repo: R,
    _marker: PhantomData<fn() -> T>,
}

impl<T, R> CrudService<T, R>
where
    T: Entity,
    R: Repository<T>,
{
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            _marker: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Insert, then read the stored row back.
    pub async fn create(&self, cx: &QueryCtx, entity: &T) -> Result<T, DataError> {
        let id = self.repo.create(cx, entity).await?;
        self.repo
            .find_by_id(cx, &id, QueryOptions::default())
            .await?
            .ok_or_else(|| DataError::NotFound(format!("{} {id:?}", T::table_name())))
    }

    /// Apply `changes` to one row; `None` when it does not exist.
    pub async fn update(&self, cx: &QueryCtx, id: &T::Id, changes: &Changes) -> Result<Option<T>, DataError> {
        let updated = self.repo.update_by_id(cx, id, changes).await?;
        if updated.is_none() {
            tracing::debug!(table = T::table_name(), id = ?id, "Update target not found");
        }
        Ok(updated)
    }

    /// Compile `request`, AND it with `cond`, and list. Paginated requests
    /// carry a total; unpaginated ones return every row with no total.
    pub async fn list(
        &self,
        cx: &QueryCtx,
        cond: Option<Condition>,
        request: &QueryRequest,
        options: QueryOptions<'_>,
    ) -> Result<QueryResult<T>, DataError> {
        let compiled = self.repo.compile(request, options);
        let cond = match cond {
            Some(cond) => cond.and(compiled),
            None => compiled,
        };
        if request.is_paginated() {
            self.repo.find_all_paged(cx, Some(&cond), request, options).await
        } else {
            let data = self.repo.find_all(cx, Some(&cond), request, options).await?;
            Ok(QueryResult::unpaged(data))
        }
    }

    pub async fn find_by_id(&self, cx: &QueryCtx, id: &T::Id) -> Result<Option<T>, DataError> {
        self.repo.find_by_id(cx, id, QueryOptions::default()).await
    }

    pub async fn find_by_ids(&self, cx: &QueryCtx, ids: &[T::Id]) -> Result<Vec<T>, DataError> {
        self.repo.find_by_ids(cx, ids, QueryOptions::default()).await
    }

    pub async fn find_one(&self, cx: &QueryCtx, cond: &Condition) -> Result<Option<T>, DataError> {
        self.repo.find_one(cx, cond, QueryOptions::default()).await
    }

    pub async fn delete_by_id(&self, cx: &QueryCtx, id: &T::Id) -> Result<bool, DataError> {
        self.repo.delete_by_id(cx, id).await
    }

    pub async fn delete_by_ids(&self, cx: &QueryCtx, ids: &[T::Id]) -> Result<u64, DataError> {
        self.repo.delete_by_ids(cx, ids).await
    }

    /// Insert or update on `conflict`, then read the stored row back.
    pub async fn upsert(&self, cx: &QueryCtx, entity: &T, conflict: &[&str], update: &[&str]) -> Result<T, DataError> {
        let id = self.repo.upsert(cx, entity, conflict, update).await?;
        self.repo
            .find_by_id(cx, &id, QueryOptions::default())
            .await?
            .ok_or_else(|| DataError::NotFound(format!("{} {id:?}", T::table_name())))
    }

    pub async fn pluck(&self, cx: &QueryCtx, column: &str, cond: Option<&Condition>) -> Result<Vec<Value>, DataError> {
        self.repo.pluck(cx, column, cond).await
    }

    pub async fn count(&self, cx: &QueryCtx, cond: Option<&Condition>) -> Result<u64, DataError> {
        self.repo.count(cx, cond).await
    }

    pub async fn exists(&self, cx: &QueryCtx, cond: &Condition) -> Result<bool, DataError> {
        self.repo.exists(cx, cond).await
    }
}
