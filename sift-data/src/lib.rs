//! Backend-agnostic data access core.
//!
//! Conditions are composed with [`Condition`], client listing requests are
//! compiled against a per-entity [`FilterSpec`] by [`filter::compile`], and
//! [`plan::Planner`] turns both into dialect-specific [`Statement`]s that a
//! backend crate executes behind the [`Repository`] contract.

pub mod changes;
pub mod condition;
pub mod config;
pub mod context;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod filter;
pub mod locale;
pub mod page;
pub mod plan;
pub mod query;
pub mod repository;
pub mod request;
pub mod service;
pub mod spec;
pub mod value;

pub use changes::Changes;
pub use condition::{Compiled, Condition, Connective};
pub use config::{ConfigError, DataConfig};
pub use context::QueryCtx;
pub use dialect::{Dialect, Statement};
pub use entity::{identity_column, Entity, IdValue, Identifier, Record};
pub use error::DataError;
pub use page::{Pageable, QueryResult, Sort, SortDirection};
pub use query::{is_valid_identifier, QueryBuilder, QueryError};
pub use repository::{QueryOptions, Repository};
pub use request::QueryRequest;
pub use service::CrudService;
pub use spec::{FilterField, FilterKind, FilterSpec, Preload, ProjectionRule, SelectField};
pub use value::Value;

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        Changes, Condition, CrudService, DataConfig, DataError, Entity, FilterField, FilterKind,
        FilterSpec, Preload, QueryCtx, QueryOptions, QueryRequest, QueryResult, Repository,
        SelectField, Value,
    };
}
