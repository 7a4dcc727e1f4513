use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use sift_data::plan::Planner;
use sift_data::spec::Rules;
use sift_data::{
    filter, locale, Changes, Condition, DataConfig, DataError, Entity, FilterSpec, Identifier,
    QueryCtx, QueryOptions, QueryRequest, QueryResult, Repository, Statement, Value,
};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, AnyPool};
use sqlx::FromRow;

use crate::error::SqlxErrorExt;
use crate::exec;
use crate::preload;
use crate::tx::{self, Conn, Tx};

/// The repository engine on an SQLx `Any` pool.
///
/// Holds the entity's [`FilterSpec`] and the [`DataConfig`] it plans with.
/// Entities are decoded with `sqlx::FromRow`.
///
/// # Example
///
/// ```ignore
/// let pool = sift_data_sqlx::connect("sqlite://app.db?mode=rwc", 5).await?;
/// let users = SqlxRepository::<User>::new(pool, user_spec())
///     .with_config(DataConfig::load("prod")?);
/// let page = users
///     .find_all_paged(&QueryCtx::new(), None, &request, QueryOptions::default())
///     .await?;
/// ```
pub struct SqlxRepository<T> {
    pool: AnyPool,
    tx: Option<Tx>,
    spec: Arc<FilterSpec>,
    config: Arc<DataConfig>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SqlxRepository<T> {
    pub fn new(pool: AnyPool, spec: FilterSpec) -> Self {
        Self {
            pool,
            tx: None,
            spec: Arc::new(spec),
            config: Arc::new(DataConfig::default()),
            _marker: PhantomData,
        }
    }

    pub fn with_config(mut self, config: DataConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// A copy of this repository whose calls run inside `tx`.
    pub fn with_tx(&self, tx: &Tx) -> Self {
        Self {
            tx: Some(tx.clone()),
            ..self.clone()
        }
    }

    /// Get the underlying pool reference.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Run `f` in a new transaction on this repository's pool.
    ///
    /// Fails with a configuration error when this repository is already
    /// bound to a transaction.
    pub async fn transaction<F, Fut, R, E>(&self, cx: &QueryCtx, f: F) -> Result<R, E>
    where
        F: FnOnce(Tx) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<DataError>,
    {
        if self.tx.is_some() {
            return Err(DataError::configuration("nested transactions are not supported").into());
        }
        tx::transaction(&self.pool, cx, f).await
    }

    async fn conn(&self) -> Result<Conn, DataError> {
        match &self.tx {
            Some(tx) => Ok(Conn::Tx(tx.lock().await)),
            None => self
                .pool
                .acquire()
                .await
                .map(Conn::Pooled)
                .map_err(|e| e.into_data_error()),
        }
    }

    fn locale(&self) -> String {
        locale::current_or(&self.config.fallback_locale)
    }

    fn spec_for<'a>(&'a self, options: &QueryOptions<'a>) -> &'a FilterSpec {
        options.spec.unwrap_or(self.spec.as_ref())
    }
}

impl<T: Entity> SqlxRepository<T> {
    fn planner<'a>(&'a self, options: QueryOptions<'a>) -> Result<Planner<'a, T>, DataError> {
        Planner::new(self.spec_for(&options), &self.config, options.unscoped)
    }

    async fn run_execute(&self, cx: &QueryCtx, stmt: &Statement) -> Result<u64, DataError> {
        cx.run(async {
            let mut conn = self.conn().await?;
            Ok(exec::execute(conn.as_mut()?, stmt).await?.rows_affected())
        })
        .await
    }

    async fn run_count(&self, cx: &QueryCtx, stmt: &Statement) -> Result<u64, DataError> {
        cx.run(async {
            let mut conn = self.conn().await?;
            exec::fetch_count(conn.as_mut()?, stmt).await
        })
        .await
    }
}

impl<T> SqlxRepository<T>
where
    T: Entity + for<'r> FromRow<'r, AnyRow>,
{
    async fn load(
        &self,
        conn: &mut AnyConnection,
        stmt: &Statement,
        rules: Rules<'_>,
        locale: &str,
    ) -> Result<Vec<T>, DataError> {
        let rows = exec::fetch_rows(conn, stmt).await?;
        let mut entities: Vec<T> = exec::decode_rows(&rows)?;
        drop(rows);
        preload::load_relations(conn, &mut entities, rules.preloads, locale, self.config.dialect).await?;
        Ok(entities)
    }

    async fn load_first(&self, cx: &QueryCtx, stmt: &Statement, rules: Rules<'_>, locale: &str) -> Result<Option<T>, DataError> {
        cx.run(async {
            let mut conn = self.conn().await?;
            Ok(self.load(conn.as_mut()?, stmt, rules, locale).await?.into_iter().next())
        })
        .await
    }

    /// Insert-if-absent, then read the row back. A created row is re-read by
    /// its own id and `cond`, so an entity that does not satisfy `cond` fails
    /// and the surrounding transaction drops the insert.
    async fn find_or_create_in(
        &self,
        cx: &QueryCtx,
        cond: &Condition,
        entity: &T,
        options: QueryOptions<'_>,
    ) -> Result<(T, bool), DataError> {
        let locale = self.locale();
        let planner = self.planner(options)?;
        let insert = planner.find_or_create(Some(cond), entity)?;
        let rules = self.spec_for(&options).rules(false);
        cx.run(async {
            let mut conn = self.conn().await?;
            let conn = conn.as_mut()?;
            let (lookup, created) = match exec::write_if_inserted(conn, &insert).await? {
                Some(id) => {
                    let id = <T::Id as Identifier>::from_id_value(id)?;
                    (cond.clone().and(planner.id_condition(&id)?), true)
                }
                None => (cond.clone(), false),
            };
            let select = planner.first(Some(&lookup), &locale)?;
            let found = self.load(conn, &select, rules, &locale).await?.into_iter().next();
            match found {
                Some(found) => Ok((found, created)),
                None if created => Err(DataError::configuration(format!(
                    "{} entity does not satisfy the find-or-create condition",
                    T::table_name()
                ))),
                None => Err(DataError::NotFound(format!(
                    "{} row vanished after find-or-create",
                    T::table_name()
                ))),
            }
        })
        .await
    }

    async fn create_each(&self, cx: &QueryCtx, entities: &[T]) -> Result<Vec<T::Id>, DataError> {
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            ids.push(self.create(cx, entity).await?);
        }
        Ok(ids)
    }
}

impl<T> Clone for SqlxRepository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            tx: self.tx.clone(),
            spec: self.spec.clone(),
            config: self.config.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Repository<T> for SqlxRepository<T>
where
    T: Entity + for<'r> FromRow<'r, AnyRow>,
{
    async fn create(&self, cx: &QueryCtx, entity: &T) -> Result<T::Id, DataError> {
        let write = self.planner(QueryOptions::default())?.insert(entity)?;
        let id = cx
            .run(async {
                let mut conn = self.conn().await?;
                exec::write_id(conn.as_mut()?, &write).await
            })
            .await?;
        <T::Id as Identifier>::from_id_value(id)
    }

    async fn create_many(&self, cx: &QueryCtx, entities: &[T]) -> Result<Vec<T::Id>, DataError> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        if self.tx.is_some() {
            return self.create_each(cx, entities).await;
        }
        tx::transaction(&self.pool, cx, |tx| async move {
            let repo = self.with_tx(&tx);
            repo.create_each(cx, entities).await
        })
        .await
    }

    async fn update(&self, cx: &QueryCtx, cond: &Condition, changes: &Changes) -> Result<u64, DataError> {
        let stmt = self.planner(QueryOptions::default())?.update(Some(cond), changes)?;
        self.run_execute(cx, &stmt).await
    }

    async fn update_by_id(&self, cx: &QueryCtx, id: &T::Id, changes: &Changes) -> Result<Option<T>, DataError> {
        let planner = self.planner(QueryOptions::default())?;
        let update = planner.update(Some(&planner.id_condition(id)?), changes)?;
        let locale = self.locale();
        let select = planner.by_id(id, &locale)?;
        let rules = self.spec.rules(false);
        cx.run(async {
            let mut conn = self.conn().await?;
            let conn = conn.as_mut()?;
            exec::execute(conn, &update).await?;
            Ok(self.load(conn, &select, rules, &locale).await?.into_iter().next())
        })
        .await
    }

    async fn find_all(
        &self,
        cx: &QueryCtx,
        cond: Option<&Condition>,
        request: &QueryRequest,
        options: QueryOptions<'_>,
    ) -> Result<Vec<T>, DataError> {
        let locale = self.locale();
        let listing = self.planner(options)?.listing(cond, request, &locale, false);
        let rules = self.spec_for(&options).rules(true);
        cx.run(async {
            let mut conn = self.conn().await?;
            self.load(conn.as_mut()?, &listing.select, rules, &locale).await
        })
        .await
    }

    async fn find_all_paged(
        &self,
        cx: &QueryCtx,
        cond: Option<&Condition>,
        request: &QueryRequest,
        options: QueryOptions<'_>,
    ) -> Result<QueryResult<T>, DataError> {
        let locale = self.locale();
        let listing = self.planner(options)?.listing(cond, request, &locale, true);
        let rules = self.spec_for(&options).rules(true);
        cx.run(async {
            let mut conn = self.conn().await?;
            let conn = conn.as_mut()?;
            let total = match &listing.count {
                Some(count) => exec::fetch_count(conn, count).await?,
                None => 0,
            };
            let data = self.load(conn, &listing.select, rules, &locale).await?;
            Ok(QueryResult::paged(total, data))
        })
        .await
    }

    async fn find_one(&self, cx: &QueryCtx, cond: &Condition, options: QueryOptions<'_>) -> Result<Option<T>, DataError> {
        let locale = self.locale();
        let stmt = self.planner(options)?.first(Some(cond), &locale)?;
        self.load_first(cx, &stmt, self.spec_for(&options).rules(false), &locale).await
    }

    async fn find_by_id(&self, cx: &QueryCtx, id: &T::Id, options: QueryOptions<'_>) -> Result<Option<T>, DataError> {
        let locale = self.locale();
        let stmt = self.planner(options)?.by_id(id, &locale)?;
        self.load_first(cx, &stmt, self.spec_for(&options).rules(false), &locale).await
    }

    async fn find_by_ids(&self, cx: &QueryCtx, ids: &[T::Id], options: QueryOptions<'_>) -> Result<Vec<T>, DataError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let locale = self.locale();
        let stmt = self.planner(options)?.by_ids(ids, &locale)?;
        let rules = self.spec_for(&options).rules(false);
        cx.run(async {
            let mut conn = self.conn().await?;
            self.load(conn.as_mut()?, &stmt, rules, &locale).await
        })
        .await
    }

    async fn delete(&self, cx: &QueryCtx, cond: &Condition) -> Result<u64, DataError> {
        let stmt = self.planner(QueryOptions::default())?.delete(Some(cond));
        self.run_execute(cx, &stmt).await
    }

    async fn delete_by_id(&self, cx: &QueryCtx, id: &T::Id) -> Result<bool, DataError> {
        let planner = self.planner(QueryOptions::default())?;
        let stmt = planner.delete(Some(&planner.id_condition(id)?));
        Ok(self.run_execute(cx, &stmt).await? > 0)
    }

    async fn delete_by_ids(&self, cx: &QueryCtx, ids: &[T::Id]) -> Result<u64, DataError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let planner = self.planner(QueryOptions::default())?;
        let stmt = planner.delete(Some(&planner.ids_condition(ids)?));
        self.run_execute(cx, &stmt).await
    }

    async fn purge(&self, cx: &QueryCtx, cond: &Condition) -> Result<u64, DataError> {
        let stmt = self.planner(QueryOptions::default())?.purge(Some(cond));
        self.run_execute(cx, &stmt).await
    }

    async fn count(&self, cx: &QueryCtx, cond: Option<&Condition>) -> Result<u64, DataError> {
        let stmt = self.planner(QueryOptions::default())?.count(cond);
        self.run_count(cx, &stmt).await
    }

    async fn exists(&self, cx: &QueryCtx, cond: &Condition) -> Result<bool, DataError> {
        Ok(self.count(cx, Some(cond)).await? > 0)
    }

    async fn exists_by_id(&self, cx: &QueryCtx, id: &T::Id) -> Result<bool, DataError> {
        let cond = self.planner(QueryOptions::default())?.id_condition(id)?;
        self.exists(cx, &cond).await
    }

    async fn pluck(&self, cx: &QueryCtx, column: &str, cond: Option<&Condition>) -> Result<Vec<Value>, DataError> {
        let stmt = self.planner(QueryOptions::default())?.pluck(column, cond)?;
        cx.run(async {
            let mut conn = self.conn().await?;
            let rows = exec::fetch_rows(conn.as_mut()?, &stmt).await?;
            rows.iter().map(|row| exec::decode_column(row, 0)).collect()
        })
        .await
    }

    fn compile(&self, request: &QueryRequest, options: QueryOptions<'_>) -> Condition {
        filter::compile(request, self.spec_for(&options))
    }

    async fn upsert(&self, cx: &QueryCtx, entity: &T, conflict: &[&str], update: &[&str]) -> Result<T::Id, DataError> {
        let write = self.planner(QueryOptions::default())?.upsert(entity, conflict, update)?;
        let id = cx
            .run(async {
                let mut conn = self.conn().await?;
                exec::write_id(conn.as_mut()?, &write).await
            })
            .await?;
        <T::Id as Identifier>::from_id_value(id)
    }

    async fn find_or_create(
        &self,
        cx: &QueryCtx,
        cond: &Condition,
        entity: &T,
        options: QueryOptions<'_>,
    ) -> Result<(T, bool), DataError> {
        if self.tx.is_some() {
            return self.find_or_create_in(cx, cond, entity, options).await;
        }
        tx::transaction(&self.pool, cx, |tx| async move {
            let repo = self.with_tx(&tx);
            repo.find_or_create_in(cx, cond, entity, options).await
        })
        .await
    }

    async fn restore_by_id(&self, cx: &QueryCtx, id: &T::Id) -> Result<bool, DataError> {
        let planner = self.planner(QueryOptions::default())?;
        let stmt = planner.restore(Some(&planner.id_condition(id)?))?;
        Ok(self.run_execute(cx, &stmt).await? > 0)
    }

    async fn restore(&self, cx: &QueryCtx, cond: &Condition) -> Result<u64, DataError> {
        let stmt = self.planner(QueryOptions::default())?.restore(Some(cond))?;
        self.run_execute(cx, &stmt).await
    }
}
