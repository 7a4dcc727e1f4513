#![allow(dead_code)]

use serde::Deserialize;
use sift_data::prelude::*;
use sift_data::{Dialect, Record};
use sift_data_sqlx::SqlxRepository;
use sqlx::AnyPool;

// Column types stay TEXT/INTEGER: the Any driver has no mapping for
// SQLite's DATETIME or BOOLEAN declarations.
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        age INTEGER NOT NULL DEFAULT 0,
        role TEXT NOT NULL DEFAULT 'member',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT
    )",
    "CREATE TABLE posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE tags (
        id TEXT PRIMARY KEY,
        label TEXT NOT NULL UNIQUE
    )",
];

#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub role: String,
    pub created_at: String,
    pub deleted_at: Option<String>,
    #[sqlx(skip)]
    pub posts: Vec<Post>,
}

impl User {
    pub fn new(name: &str, email: &str, age: i64, role: &str) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age,
            role: role.into(),
            ..Default::default()
        }
    }
}

impl Entity for User {
    type Id = i64;

    fn table_name() -> &'static str {
        "users"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "name", "email", "age", "role", "created_at", "deleted_at"]
    }

    fn id(&self) -> &i64 {
        &self.id
    }

    fn soft_delete_column() -> Option<&'static str> {
        Some("deleted_at")
    }

    fn column_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", self.name.clone().into()),
            ("email", self.email.clone().into()),
            ("age", self.age.into()),
            ("role", self.role.clone().into()),
        ]
    }

    fn attach(&mut self, relation: &str, records: Vec<Record>) -> Result<(), DataError> {
        match relation {
            "posts" => {
                self.posts = records
                    .into_iter()
                    .map(Record::deserialize)
                    .collect::<Result<_, _>>()?;
                Ok(())
            }
            other => Err(DataError::configuration(format!("unknown relation {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
}

impl Entity for Post {
    type Id = i64;

    fn table_name() -> &'static str {
        "posts"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "user_id", "title", "deleted_at"]
    }

    fn id(&self) -> &i64 {
        &self.id
    }

    fn soft_delete_column() -> Option<&'static str> {
        Some("deleted_at")
    }

    fn column_values(&self) -> Vec<(&'static str, Value)> {
        vec![("user_id", self.user_id.into()), ("title", self.title.clone().into())]
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Tag {
    pub id: String,
    pub label: String,
}

impl Entity for Tag {
    type Id = String;

    fn table_name() -> &'static str {
        "tags"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "label"]
    }

    fn id(&self) -> &String {
        &self.id
    }

    fn column_values(&self) -> Vec<(&'static str, Value)> {
        vec![("id", self.id.clone().into()), ("label", self.label.clone().into())]
    }
}

pub fn user_spec() -> FilterSpec {
    FilterSpec::new()
        .filter("role", FilterField::new(FilterKind::Equal))
        .filter("min_age", FilterField::on("age", FilterKind::Gte))
        .filter("roles", FilterField::on("role", FilterKind::In))
        .searchable(&["name", "email"])
        .default_sort("id")
}

pub fn config() -> DataConfig {
    DataConfig::default().with_dialect(Dialect::Sqlite)
}

/// Route engine logs to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn create_schema(pool: &AnyPool) {
    init_tracing();
    for ddl in SCHEMA {
        sqlx::query(ddl).execute(pool).await.unwrap();
    }
}

/// A single-connection in-memory database with the schema applied.
pub async fn memory_pool() -> AnyPool {
    let pool = sift_data_sqlx::connect("sqlite::memory:", 1).await.unwrap();
    create_schema(&pool).await;
    pool
}

pub fn users(pool: &AnyPool) -> SqlxRepository<User> {
    SqlxRepository::new(pool.clone(), user_spec()).with_config(config())
}

pub fn posts(pool: &AnyPool) -> SqlxRepository<Post> {
    SqlxRepository::new(pool.clone(), FilterSpec::new()).with_config(config())
}

pub fn tags(pool: &AnyPool) -> SqlxRepository<Tag> {
    SqlxRepository::new(pool.clone(), FilterSpec::new().default_sort("id")).with_config(config())
}

pub async fn seed_users(repo: &SqlxRepository<User>) -> Vec<i64> {
    let cx = QueryCtx::new();
    let rows = [
        User::new("Alice", "alice@example.com", 34, "admin"),
        User::new("Bob", "bob@example.com", 27, "member"),
        User::new("Carol", "carol@example.com", 41, "member"),
        User::new("Dave", "dave@example.com", 19, "guest"),
        User::new("Erin", "erin@example.com", 52, "admin"),
    ];
    repo.create_many(&cx, &rows).await.unwrap()
}
