//! # sift-data-sqlx: SQLx backend for sift
//!
//! Executes the statements planned by [`sift-data`](sift_data) on an
//! `sqlx::AnyPool`, so one repository type serves SQLite, PostgreSQL and
//! MySQL.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqlxRepository`] | [`Repository`](sift_data::Repository) implementation over an `AnyPool` |
//! | [`Tx`] / [`transaction`] | Scoped transactions: commit on `Ok`, rollback on `Err` |
//! | [`connect`] | Installs the `Any` drivers and opens a pool |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` into `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//!
//! # Feature flags
//!
//! | Feature    | Driver |
//! |------------|--------|
//! | `sqlite`   | SQLite via `sqlx/sqlite` (default) |
//! | `postgres` | PostgreSQL via `sqlx/postgres` |
//! | `mysql`    | MySQL via `sqlx/mysql` |
//!
//! # Quick start
//!
//! ```ignore
//! use sift_data_sqlx::prelude::*;
//!
//! let url = "postgres://localhost/app";
//! let pool = sift_data_sqlx::connect(url, 10).await?;
//! let config = DataConfig::load("prod")?.with_dialect(Dialect::from_url(url));
//! let users = SqlxRepository::<User>::new(pool, user_spec()).with_config(config);
//!
//! let cx = QueryCtx::new().with_timeout(Duration::from_secs(2));
//! let page = users
//!     .find_all_paged(&cx, None, &request, QueryOptions::default())
//!     .await?;
//! ```
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead:
//!
//! ```ignore
//! use sift_data_sqlx::SqlxErrorExt;
//!
//! let row = sqlx::query("SELECT 1")
//!     .fetch_one(&pool)
//!     .await
//!     .map_err(|e| e.into_data_error())?;
//! ```

pub mod error;
mod exec;
mod preload;
pub mod repository;
pub mod tx;

use sift_data::DataError;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

pub use error::{SqlxErrorExt, SqlxResult};
pub use repository::SqlxRepository;
pub use tx::{transaction, Tx};

/// Open an `Any` pool on `url` with the compiled-in drivers installed.
pub async fn connect(url: &str, max_connections: u32) -> Result<AnyPool, DataError> {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .map_err(|e| e.into_data_error())?;
    tracing::info!(max_connections, "Database pool opened");
    Ok(pool)
}

/// Re-exports of the most commonly used types from both `sift-data` and this crate.
pub mod prelude {
    pub use crate::{connect, transaction, SqlxErrorExt, SqlxRepository, Tx};
    pub use sift_data::prelude::*;
    pub use sift_data::Dialect;
}
