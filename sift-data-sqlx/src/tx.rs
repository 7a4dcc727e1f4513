//! Scoped transactions.
//!
//! [`transaction`] begins a transaction, hands a cloneable [`Tx`] handle to
//! the unit of work, commits when it returns `Ok` and rolls back when it
//! returns `Err`. Repositories join the transaction through
//! [`SqlxRepository::with_tx`](crate::SqlxRepository::with_tx).

use std::future::Future;
use std::sync::Arc;

use sift_data::{DataError, QueryCtx};
use sqlx::{AnyConnection, AnyPool};
use sqlx::pool::PoolConnection;
use sqlx::{Any, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::SqlxErrorExt;

/// Shared handle on an open transaction.
///
/// Operations on the same `Tx` are serialised: each repository call holds
/// the transaction for the duration of its round trips.
#[derive(Clone)]
pub struct Tx {
    inner: Arc<Mutex<Option<Transaction<'static, Any>>>>,
}

impl Tx {
    fn new(tx: Transaction<'static, Any>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub(crate) async fn lock(&self) -> OwnedMutexGuard<Option<Transaction<'static, Any>>> {
        self.inner.clone().lock_owned().await
    }

    async fn finish(&self) -> Result<Transaction<'static, Any>, DataError> {
        self.inner
            .lock()
            .await
            .take()
            .ok_or_else(|| DataError::configuration("transaction already finished"))
    }
}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx").finish_non_exhaustive()
    }
}

/// A connection checked out for one repository call.
pub(crate) enum Conn {
    Pooled(PoolConnection<Any>),
    Tx(OwnedMutexGuard<Option<Transaction<'static, Any>>>),
}

impl Conn {
    pub(crate) fn as_mut(&mut self) -> Result<&mut AnyConnection, DataError> {
        match self {
            Conn::Pooled(conn) => Ok(&mut **conn),
            Conn::Tx(guard) => (**guard)
                .as_mut()
                .map(|tx| &mut **tx)
                .ok_or_else(|| DataError::configuration("transaction already finished")),
        }
    }
}

/// Run `f` inside a transaction on `pool`.
///
/// Begin and commit failures are mapped into `E`. Nested transactions are
/// not supported.
///
/// ```ignore
/// let ids = transaction(&pool, &cx, |tx| async move {
///     let users = users.with_tx(&tx);
///     let a = users.create(&cx, &alice).await?;
///     let b = users.create(&cx, &bob).await?;
///     Ok::<_, DataError>(vec![a, b])
/// })
/// .await?;
/// ```
pub async fn transaction<F, Fut, R, E>(pool: &AnyPool, cx: &QueryCtx, f: F) -> Result<R, E>
where
    F: FnOnce(Tx) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: From<DataError>,
{
    let begun = cx
        .run(async { pool.begin().await.map_err(|e| e.into_data_error()) })
        .await?;
    let tx = Tx::new(begun);
    tracing::debug!("Transaction started");

    let res = f(tx.clone()).await;
    let inner = tx.finish().await?;

    match res {
        Ok(value) => {
            inner.commit().await.map_err(|e| e.into_data_error())?;
            tracing::debug!("Transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = inner.rollback().await {
                tracing::warn!(error = %rollback, "Transaction rollback failed");
            } else {
                tracing::debug!("Transaction rolled back");
            }
            Err(err)
        }
    }
}
