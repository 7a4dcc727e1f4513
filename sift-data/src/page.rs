use serde::{Deserialize, Serialize};

use crate::config::DataConfig;
use crate::query::is_valid_identifier;

/// Normalised pagination window (1-based page).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pageable {
    pub page: u64,
    pub per_page: u64,
}

impl Default for Pageable {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DataConfig::DEFAULT_PER_PAGE,
        }
    }
}

impl Pageable {
    /// Largest offset any backend accepts (signed 64-bit).
    pub const MAX_OFFSET: u64 = i64::MAX as u64;

    /// Normalise raw client input: `page <= 0` becomes 1, `per_page <= 0`
    /// becomes the configured default, and sizes above `max_per_page` are
    /// clamped. The page size is never below 1.
    pub fn normalize(page: i64, per_page: i64, config: &DataConfig) -> Self {
        let page = if page <= 0 { 1 } else { page as u64 };
        let mut per_page = if per_page <= 0 {
            config.default_per_page
        } else {
            per_page as u64
        };
        if let Some(max) = config.max_per_page {
            per_page = per_page.min(max);
        }
        Self {
            page,
            per_page: per_page.max(1),
        }
    }

    /// Rows to skip, saturating at [`Self::MAX_OFFSET`] for huge pages.
    pub fn offset(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.per_page)
            .min(Self::MAX_OFFSET)
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Case-insensitive `asc`/`desc`; anything else is `Desc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A resolved ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
}

impl Sort {
    /// Resolve the sort column through the fallback chain: requested key,
    /// then the entity's default sort, then the configured default.
    pub fn resolve(
        requested: Option<&str>,
        direction: Option<&str>,
        spec_default: Option<&str>,
        config: &DataConfig,
    ) -> Self {
        let requested = requested.map(str::trim).filter(|key| !key.is_empty());
        let requested = match requested {
            Some(key) if is_valid_identifier(key, false) => Some(key),
            Some(key) => {
                tracing::warn!(sort_key = key, "Ignoring invalid sort key");
                None
            }
            None => None,
        };
        let column = requested
            .or(spec_default.filter(|key| !key.is_empty()))
            .unwrap_or(&config.default_sort);
        Self {
            column: column.to_string(),
            direction: SortDirection::parse(direction),
        }
    }
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_sql())
    }
}

/// Result of a listing: the total (paginated listings only) and the rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult<T> {
    pub total: Option<u64>,
    pub data: Vec<T>,
}

impl<T> QueryResult<T> {
    pub fn paged(total: u64, data: Vec<T>) -> Self {
        Self {
            total: Some(total),
            data,
        }
    }

    pub fn unpaged(data: Vec<T>) -> Self {
        Self { total: None, data }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> QueryResult<U> {
        QueryResult {
            total: self.total,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_defaults() {
        let p = Pageable::normalize(0, -5, &DataConfig::default());
        assert_eq!(p, Pageable { page: 1, per_page: 10 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_huge_page_saturates_offset() {
        let p = Pageable::normalize(i64::MAX, 10, &DataConfig::default());
        assert_eq!(p.page, i64::MAX as u64);
        assert_eq!(p.offset(), Pageable::MAX_OFFSET);
        assert_eq!(p.limit(), 10);
    }

    #[test]
    fn test_zero_sizes_never_yield_empty_pages() {
        let config = DataConfig {
            default_per_page: 0,
            max_per_page: Some(0),
            ..DataConfig::default()
        };
        let p = Pageable::normalize(2, 0, &config);
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 1);
    }

    #[test]
    fn test_normalize_offset_and_clamp() {
        let config = DataConfig {
            max_per_page: Some(50),
            ..DataConfig::default()
        };
        let p = Pageable::normalize(3, 500, &config);
        assert_eq!(p.per_page, 50);
        assert_eq!(p.offset(), 100);
    }

    #[test]
    fn test_sort_falls_back_to_default_desc() {
        let sort = Sort::resolve(None, None, Some("created_at"), &DataConfig::default());
        assert_eq!(sort.to_string(), "created_at DESC");
    }

    #[test]
    fn test_sort_chain() {
        let config = DataConfig::default();
        assert_eq!(
            Sort::resolve(Some("name"), Some("ASC"), Some("id"), &config).to_string(),
            "name ASC"
        );
        assert_eq!(
            Sort::resolve(None, Some("sideways"), None, &config).to_string(),
            "created_at DESC"
        );
        assert_eq!(
            Sort::resolve(Some("name; DROP TABLE x"), Some("asc"), Some("id"), &config).to_string(),
            "id ASC"
        );
    }

    #[test]
    fn test_query_result_serialises() {
        let json = serde_json::to_value(QueryResult::paged(3, vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({"total": 3, "data": [1, 2]}));
    }
}
