use std::collections::BTreeMap;

use serde::Deserialize;

use crate::value::Value;

/// A listing request, already parsed by the transport layer.
///
/// Unknown top-level keys land in `filters`, so a query string or JSON body
/// such as `{"page": 2, "status": "active"}` deserialises directly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub page: i64,
    pub per_page: i64,
    pub pagination: Option<bool>,
    pub search: Option<String>,
    pub sort_key: Option<String>,
    pub sort_dir: Option<String>,
    #[serde(flatten)]
    pub filters: BTreeMap<String, Value>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 0,
            pagination: None,
            search: None,
            sort_key: None,
            sort_dir: None,
            filters: BTreeMap::new(),
        }
    }
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paged(mut self, page: i64, per_page: i64) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn searching(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn sorted_by(mut self, key: impl Into<String>, dir: impl Into<String>) -> Self {
        self.sort_key = Some(key.into());
        self.sort_dir = Some(dir.into());
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn unpaginated(mut self) -> Self {
        self.pagination = Some(false);
        self
    }

    /// Pagination is on unless explicitly disabled.
    pub fn is_paginated(&self) -> bool {
        self.pagination.unwrap_or(true)
    }

    /// The trimmed search term, if any.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}
