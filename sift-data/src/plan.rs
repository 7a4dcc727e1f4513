//! Statement synthesis for the repository engine.
//!
//! A [`Planner`] turns conditions, requests and entities into rendered
//! [`Statement`]s for one entity type. It performs no I/O, so every
//! configuration problem surfaces here before a backend is touched.

use std::marker::PhantomData;

use crate::changes::Changes;
use crate::condition::Condition;
use crate::config::DataConfig;
use crate::dialect::{Dialect, Statement};
use crate::entity::{identity_column, Entity, IdValue, Identifier};
use crate::error::DataError;
use crate::page::{Pageable, Sort, SortDirection};
use crate::query::{check_identifier, QueryBuilder, QueryError};
use crate::request::QueryRequest;
use crate::spec::{render_projection, FilterSpec, Preload};
use crate::value::Value;

/// Alias under which preload queries return the grouping key.
pub const PRELOAD_KEY: &str = "sift_preload_key";

/// A listing: the page fetch, the optional count and the window applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub select: Statement,
    pub count: Option<Statement>,
    pub page: Option<Pageable>,
}

/// Where the identity of a freshly written row comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum IdSource {
    /// The entity wrote its own id.
    Known(IdValue),
    /// The statement ends in `RETURNING <id>`.
    Returning,
    /// Read the driver's last insert id (MySQL).
    LastInsertId,
    /// Run this `SELECT <id>` after the write (dialects without `RETURNING`).
    Lookup(Statement),
}

/// An INSERT-like statement and how to recover the written identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub statement: Statement,
    pub id: IdSource,
}

pub struct Planner<'a, T> {
    spec: &'a FilterSpec,
    config: &'a DataConfig,
    unscoped: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Entity> Planner<'a, T> {
    pub fn new(spec: &'a FilterSpec, config: &'a DataConfig, unscoped: bool) -> Result<Self, DataError> {
        check_identifier(T::table_name(), "table")?;
        if let Some(column) = T::soft_delete_column() {
            check_identifier(column, "column")?;
        }
        Ok(Self {
            spec,
            config,
            unscoped: unscoped || spec.unscoped,
            _marker: PhantomData,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    pub fn id_column(&self) -> Result<&'static str, DataError> {
        identity_column::<T>()
    }

    fn qualified(column: &str) -> String {
        format!("{}.{column}", T::table_name())
    }

    fn soft_scope(&self) -> Option<String> {
        if self.unscoped {
            return None;
        }
        T::soft_delete_column().map(Self::qualified)
    }

    /// `<table>.<id> = ?`
    pub fn id_condition(&self, id: &T::Id) -> Result<Condition, DataError> {
        let column = Self::qualified(self.id_column()?);
        Ok(Condition::eq(&column, Value::from(id.to_id_value())))
    }

    /// `<table>.<id> IN (?)`
    pub fn ids_condition(&self, ids: &[T::Id]) -> Result<Condition, DataError> {
        let column = Self::qualified(self.id_column()?);
        let ids: Vec<Value> = ids.iter().map(|id| id.to_id_value().into()).collect();
        Ok(Condition::in_list(&column, ids))
    }

    /// Joins, the caller's predicate and the soft-delete scope.
    fn conditions(&self, cond: Option<&Condition>) -> QueryBuilder {
        let mut query = QueryBuilder::new_with_dialect(T::table_name(), self.dialect());
        for join in &self.spec.joins {
            query = query.join(join);
        }
        self.predicates(query, cond, self.soft_scope())
    }

    fn predicates(&self, mut query: QueryBuilder, cond: Option<&Condition>, scope: Option<String>) -> QueryBuilder {
        if let Some(cond) = cond {
            query = query.where_condition(cond);
        }
        if let Some(column) = scope {
            query = query.where_null(&column);
        }
        query
    }

    fn select_list(&self, listing: bool, locale: &str) -> String {
        render_projection(self.spec.rules(listing).projection, locale).unwrap_or_else(|| {
            if self.spec.joins.is_empty() {
                "*".to_string()
            } else {
                format!("{}.*", T::table_name())
            }
        })
    }

    /// Plan a listing ordered by the resolved sort. With `counted`, a count
    /// over the same joins, predicate and grouping is planned too, and the
    /// page window is applied when the request enables pagination.
    pub fn listing(&self, cond: Option<&Condition>, request: &QueryRequest, locale: &str, counted: bool) -> Listing {
        let sort = Sort::resolve(
            request.sort_key.as_deref(),
            request.sort_dir.as_deref(),
            self.spec.default_sort.as_deref(),
            self.config,
        );
        let mut query = self.conditions(cond);
        for column in &self.spec.group_by {
            query = query.group_by(column);
        }
        let count = counted.then(|| query.build_count());

        let mut query = query.order_by(&sort.column, sort.direction);
        let page = (counted && request.is_paginated())
            .then(|| Pageable::normalize(request.page, request.per_page, self.config));
        if let Some(page) = page {
            query = query.limit(page.limit()).offset(page.offset());
        }

        Listing {
            select: query.build_select(&self.select_list(true, locale)),
            count,
            page,
        }
    }

    /// First matching row by identity order.
    pub fn first(&self, cond: Option<&Condition>, locale: &str) -> Result<Statement, DataError> {
        let id = Self::qualified(self.id_column()?);
        Ok(self
            .conditions(cond)
            .order_by(&id, SortDirection::Asc)
            .limit(1)
            .build_select(&self.select_list(false, locale)))
    }

    pub fn by_id(&self, id: &T::Id, locale: &str) -> Result<Statement, DataError> {
        self.first(Some(&self.id_condition(id)?), locale)
    }

    pub fn by_ids(&self, ids: &[T::Id], locale: &str) -> Result<Statement, DataError> {
        let order = Self::qualified(self.id_column()?);
        Ok(self
            .conditions(Some(&self.ids_condition(ids)?))
            .order_by(&order, SortDirection::Asc)
            .build_select(&self.select_list(false, locale)))
    }

    pub fn count(&self, cond: Option<&Condition>) -> Statement {
        self.conditions(cond).build_count()
    }

    pub fn pluck(&self, column: &str, cond: Option<&Condition>) -> Result<Statement, DataError> {
        check_identifier(column, "column")?;
        Ok(self.conditions(cond).build_pluck(column))
    }

    fn mutation(&self, head: String, mut args: Vec<Value>, cond: Option<&Condition>, scope: Option<String>) -> Statement {
        let query = QueryBuilder::new_with_dialect(T::table_name(), self.dialect());
        let query = self.predicates(query, cond, scope);
        let mut sql = head;
        if let Some((predicate, where_args)) = query.where_sql() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
            args.extend(where_args);
        }
        self.dialect().render(&sql, args)
    }

    /// `UPDATE <table> SET .. WHERE ..`, honouring the soft-delete scope.
    pub fn update(&self, cond: Option<&Condition>, changes: &Changes) -> Result<Statement, DataError> {
        if changes.is_empty() {
            return Err(QueryError::EmptyAssignment.into());
        }
        let mut assignments = Vec::with_capacity(changes.len());
        let mut args = Vec::with_capacity(changes.len());
        for (column, value) in changes.iter() {
            check_identifier(column, "column")?;
            assignments.push(format!("{column} = ?"));
            args.push(value.clone());
        }
        let head = format!("UPDATE {} SET {}", T::table_name(), assignments.join(", "));
        Ok(self.mutation(head, args, cond, self.soft_scope()))
    }

    /// Soft delete (stamp the marker on live rows) when the entity has a
    /// marker column, hard delete otherwise.
    pub fn delete(&self, cond: Option<&Condition>) -> Statement {
        match T::soft_delete_column() {
            Some(marker) => {
                let head = format!("UPDATE {} SET {marker} = CURRENT_TIMESTAMP", T::table_name());
                self.mutation(head, Vec::new(), cond, Some(Self::qualified(marker)))
            }
            None => self.purge(cond),
        }
    }

    /// Hard delete, ignoring the soft-delete scope.
    pub fn purge(&self, cond: Option<&Condition>) -> Statement {
        let head = format!("DELETE FROM {}", T::table_name());
        self.mutation(head, Vec::new(), cond, None)
    }

    /// Clear the deletion marker, bypassing the scope.
    pub fn restore(&self, cond: Option<&Condition>) -> Result<Statement, DataError> {
        let Some(marker) = T::soft_delete_column() else {
            return Err(DataError::configuration(format!(
                "{} has no soft-delete column to restore",
                T::table_name()
            )));
        };
        let head = format!("UPDATE {} SET {marker} = NULL", T::table_name());
        Ok(self.mutation(head, Vec::new(), cond, None))
    }

    fn written_columns(entity: &T) -> Result<(Vec<&'static str>, Vec<Value>), DataError> {
        let values = entity.column_values();
        if values.is_empty() {
            return Err(QueryError::EmptyAssignment.into());
        }
        let mut columns = Vec::with_capacity(values.len());
        let mut args = Vec::with_capacity(values.len());
        for (column, value) in values {
            check_identifier(column, "column")?;
            columns.push(column);
            args.push(value);
        }
        Ok((columns, args))
    }

    fn id_source(&self, columns: &[&str], entity: &T) -> Result<(IdSource, String), DataError> {
        let id = self.id_column()?;
        if columns.contains(&id) {
            Ok((IdSource::Known(entity.id().to_id_value()), String::new()))
        } else if self.dialect().supports_returning() {
            Ok((IdSource::Returning, format!(" RETURNING {id}")))
        } else {
            Ok((IdSource::LastInsertId, String::new()))
        }
    }

    /// The payload's own id is only the stored id when the conflict target
    /// includes the id column. On any other conflict the existing row keeps
    /// its id, which is returned or looked up by the conflict columns.
    fn upsert_id_source(
        &self,
        columns: &[&str],
        args: &[Value],
        conflict: &[&str],
        entity: &T,
    ) -> Result<(IdSource, String), DataError> {
        let id = self.id_column()?;
        if !columns.contains(&id) || conflict.contains(&id) {
            return self.id_source(columns, entity);
        }
        if self.dialect().supports_returning() {
            return Ok((IdSource::Returning, format!(" RETURNING {id}")));
        }
        let mut query = QueryBuilder::new_with_dialect(T::table_name(), self.dialect());
        for column in conflict {
            let value = columns
                .iter()
                .position(|c| c == column)
                .and_then(|i| args.get(i).cloned())
                .ok_or_else(|| {
                    DataError::configuration(format!(
                        "conflict column '{column}' is not written by {}",
                        T::table_name()
                    ))
                })?;
            query = query.where_condition(&Condition::eq(column, value));
        }
        Ok((IdSource::Lookup(query.build_pluck(id)), String::new()))
    }

    pub fn insert(&self, entity: &T) -> Result<Write, DataError> {
        let (columns, args) = Self::written_columns(entity)?;
        let (id, returning) = self.id_source(&columns, entity)?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}){returning}",
            T::table_name(),
            columns.join(", ")
        );
        Ok(Write {
            statement: self.dialect().render(&sql, args),
            id,
        })
    }

    /// Insert-or-update in one statement.
    ///
    /// `conflict` defaults to the identity column. An empty `update` set
    /// updates every written column except the conflict and identity
    /// columns; if that leaves nothing, the first conflict column is
    /// reassigned to itself so the statement still yields the row.
    pub fn upsert(&self, entity: &T, conflict: &[&str], update: &[&str]) -> Result<Write, DataError> {
        let id_column = self.id_column()?;
        let (columns, args) = Self::written_columns(entity)?;
        let conflict: Vec<&str> = if conflict.is_empty() {
            vec![id_column]
        } else {
            conflict.to_vec()
        };
        for column in conflict.iter().chain(update) {
            check_identifier(column, "column")?;
        }
        let mut targets: Vec<&str> = if update.is_empty() {
            columns
                .iter()
                .copied()
                .filter(|c| !conflict.contains(c) && *c != id_column)
                .collect()
        } else {
            update.to_vec()
        };
        if targets.is_empty() {
            targets.push(conflict[0]);
        }

        let (id, returning) = self.upsert_id_source(&columns, &args, &conflict, entity)?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            T::table_name(),
            columns.join(", ")
        );
        let sql = match self.dialect() {
            Dialect::MySql => {
                let mut sets: Vec<String> = targets.iter().map(|c| format!("{c} = VALUES({c})")).collect();
                if id == IdSource::LastInsertId {
                    sets.push(format!("{id_column} = LAST_INSERT_ID({id_column})"));
                }
                format!("{insert} ON DUPLICATE KEY UPDATE {}", sets.join(", "))
            }
            _ => {
                let sets: Vec<String> = targets.iter().map(|c| format!("{c} = excluded.{c}")).collect();
                format!(
                    "{insert} ON CONFLICT ({}) DO UPDATE SET {}{returning}",
                    conflict.join(", "),
                    sets.join(", ")
                )
            }
        };
        Ok(Write {
            statement: self.dialect().render(&sql, args),
            id,
        })
    }

    /// Single-statement find-or-insert: the row is inserted only if no live
    /// row matches `cond`. An affected row means it was created, and `id`
    /// says how to read its identity back.
    ///
    /// The `NOT EXISTS` guard alone is race-free only where writers are
    /// serialised (SQLite). On Postgres and MySQL a unique constraint must
    /// back `cond`: the losing insert is then dropped by
    /// `ON CONFLICT DO NOTHING` / `INSERT IGNORE` instead of duplicating.
    pub fn find_or_create(&self, cond: Option<&Condition>, entity: &T) -> Result<Write, DataError> {
        let (columns, mut args) = Self::written_columns(entity)?;
        let (id, returning) = self.id_source(&columns, entity)?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let (verb, from_dual) = if self.dialect() == Dialect::MySql {
            ("INSERT IGNORE", " FROM DUAL")
        } else {
            ("INSERT", "")
        };
        let mut sql = format!(
            "{verb} INTO {table} ({}) SELECT {placeholders}{from_dual} WHERE NOT EXISTS (SELECT 1 FROM {table}",
            columns.join(", "),
            table = T::table_name(),
        );
        let query = QueryBuilder::new(T::table_name());
        let query = self.predicates(query, cond, self.soft_scope());
        if let Some((predicate, where_args)) = query.where_sql() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
            args.extend(where_args);
        }
        sql.push(')');
        if self.dialect() == Dialect::Postgres {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }
        sql.push_str(&returning);
        Ok(Write {
            statement: self.dialect().render(&sql, args),
            id,
        })
    }

    pub fn locale_fallback(&self) -> &str {
        &self.config.fallback_locale
    }
}

/// Plan the eager-load query of `preload` for the given parent keys.
pub fn preload_statement(preload: &Preload, keys: Vec<Value>, locale: &str, dialect: Dialect) -> Result<Statement, DataError> {
    check_identifier(&preload.table, "table")?;
    check_identifier(&preload.foreign_key, "column")?;
    let projection = render_projection(preload.projection.as_ref(), locale)
        .unwrap_or_else(|| format!("{}.*", preload.table));
    let mut query = QueryBuilder::new_with_dialect(&preload.table, dialect)
        .where_condition(&Condition::in_list(&preload.foreign_key, keys));
    if !preload.include_deleted {
        if let Some(column) = &preload.soft_delete_column {
            check_identifier(column, "column")?;
            query = query.where_null(&format!("{}.{column}", preload.table));
        }
    }
    Ok(query.build_select(&format!("{projection}, {} AS {PRELOAD_KEY}", preload.foreign_key)))
}
