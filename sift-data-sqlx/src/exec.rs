//! Statement execution on an `AnyConnection`.
//!
//! Rendered statements only carry scalar arguments; they are narrowed to the
//! types every `Any` driver can bind before execution.

use sift_data::plan::{IdSource, Write};
use sift_data::{DataError, IdValue, Record, Statement, Value};
use sqlx::any::{AnyQueryResult, AnyRow};
use sqlx::AnyConnection;
use sqlx::{Column, Row};

use crate::error::SqlxErrorExt;

enum Bound {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn bound(args: &[Value]) -> Result<Vec<Bound>, DataError> {
    args.iter()
        .map(|arg| match arg {
            Value::Null => Ok(Bound::Null),
            Value::Bool(b) => Ok(Bound::Bool(*b)),
            Value::Int(i) => Ok(Bound::Int(*i)),
            Value::UInt(u) => i64::try_from(*u).map(Bound::Int).map_err(|_| {
                DataError::configuration(format!("unsigned value {u} does not fit a signed 64-bit column"))
            }),
            Value::Float(f) => Ok(Bound::Float(*f)),
            Value::Text(s) => Ok(Bound::Text(s.clone())),
            Value::Json(j) => Ok(Bound::Text(j.to_string())),
            Value::List(_) => Err(DataError::configuration(
                "list argument reached the driver unexpanded",
            )),
        })
        .collect()
}

macro_rules! bind_all {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args {
            query = match arg {
                Bound::Null => query.bind(None::<String>),
                Bound::Bool(v) => query.bind(v),
                Bound::Int(v) => query.bind(v),
                Bound::Float(v) => query.bind(v),
                Bound::Text(v) => query.bind(v),
            };
        }
        query
    }};
}

pub(crate) async fn execute(conn: &mut AnyConnection, stmt: &Statement) -> Result<AnyQueryResult, DataError> {
    tracing::debug!(sql = %stmt.sql, args = stmt.args.len(), "Executing statement");
    let args = bound(&stmt.args)?;
    bind_all!(sqlx::query(&stmt.sql), args)
        .execute(conn)
        .await
        .map_err(|e| e.into_data_error())
}

pub(crate) async fn fetch_rows(conn: &mut AnyConnection, stmt: &Statement) -> Result<Vec<AnyRow>, DataError> {
    tracing::debug!(sql = %stmt.sql, args = stmt.args.len(), "Fetching rows");
    let args = bound(&stmt.args)?;
    bind_all!(sqlx::query(&stmt.sql), args)
        .fetch_all(conn)
        .await
        .map_err(|e| e.into_data_error())
}

pub(crate) async fn fetch_optional(conn: &mut AnyConnection, stmt: &Statement) -> Result<Option<AnyRow>, DataError> {
    tracing::debug!(sql = %stmt.sql, args = stmt.args.len(), "Fetching row");
    let args = bound(&stmt.args)?;
    bind_all!(sqlx::query(&stmt.sql), args)
        .fetch_optional(conn)
        .await
        .map_err(|e| e.into_data_error())
}

pub(crate) async fn fetch_count(conn: &mut AnyConnection, stmt: &Statement) -> Result<u64, DataError> {
    let row = fetch_optional(conn, stmt)
        .await?
        .ok_or_else(|| DataError::Other("count returned no row".into()))?;
    match decode_column(&row, 0)? {
        Value::Int(n) => Ok(u64::try_from(n).unwrap_or_default()),
        Value::UInt(n) => Ok(n),
        other => Err(DataError::Other(format!("count returned {}", other.kind()))),
    }
}

/// Run an INSERT-like write and recover the identity of the written row.
pub(crate) async fn write_id(conn: &mut AnyConnection, write: &Write) -> Result<IdValue, DataError> {
    match &write.id {
        IdSource::Known(id) => {
            execute(conn, &write.statement).await?;
            Ok(id.clone())
        }
        IdSource::Returning => {
            let row = fetch_optional(conn, &write.statement)
                .await?
                .ok_or_else(|| DataError::Other("write returned no identity".into()))?;
            IdValue::from_value(decode_column(&row, 0)?)
        }
        IdSource::LastInsertId => last_insert_id(&execute(conn, &write.statement).await?),
        IdSource::Lookup(lookup) => {
            execute(conn, &write.statement).await?;
            lookup_id(conn, lookup).await
        }
    }
}

/// Like [`write_id`] for a guarded insert: `None` when no row was written.
pub(crate) async fn write_if_inserted(conn: &mut AnyConnection, write: &Write) -> Result<Option<IdValue>, DataError> {
    match &write.id {
        IdSource::Returning => match fetch_optional(conn, &write.statement).await? {
            Some(row) => IdValue::from_value(decode_column(&row, 0)?).map(Some),
            None => Ok(None),
        },
        source => {
            let done = execute(conn, &write.statement).await?;
            if done.rows_affected() == 0 {
                return Ok(None);
            }
            match source {
                IdSource::Known(id) => Ok(Some(id.clone())),
                IdSource::Lookup(lookup) => lookup_id(conn, lookup).await.map(Some),
                _ => last_insert_id(&done).map(Some),
            }
        }
    }
}

fn last_insert_id(done: &AnyQueryResult) -> Result<IdValue, DataError> {
    done.last_insert_id()
        .map(IdValue::Int)
        .ok_or_else(|| DataError::configuration("driver reported no last insert id"))
}

async fn lookup_id(conn: &mut AnyConnection, lookup: &Statement) -> Result<IdValue, DataError> {
    let row = fetch_optional(conn, lookup)
        .await?
        .ok_or_else(|| DataError::NotFound("written row not found by its conflict columns".into()))?;
    IdValue::from_value(decode_column(&row, 0)?)
}

pub(crate) fn decode_rows<T>(rows: &[AnyRow]) -> Result<Vec<T>, DataError>
where
    T: for<'r> sqlx::FromRow<'r, AnyRow>,
{
    rows.iter()
        .map(|row| T::from_row(row).map_err(|e| e.into_data_error()))
        .collect()
}

/// Decode one column without knowing its type up front.
pub(crate) fn decode_column(row: &AnyRow, idx: usize) -> Result<Value, DataError> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return Ok(v.map_or(Value::Null, Value::Int));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return Ok(v.map_or(Value::Null, Value::Float));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return Ok(v.map_or(Value::Null, Value::Text));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return Ok(v.map_or(Value::Null, Value::Bool));
    }
    row.try_get::<Option<Vec<u8>>, _>(idx)
        .map(|v| v.map_or(Value::Null, |bytes| Value::Text(String::from_utf8_lossy(&bytes).into_owned())))
        .map_err(|e| e.into_data_error())
}

pub(crate) fn decode_record(row: &AnyRow) -> Result<Record, DataError> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        record.insert(column.name(), decode_column(row, idx)?);
    }
    Ok(record)
}
