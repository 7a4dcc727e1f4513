//! Per-entity query configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

/// Operator synthesised for a filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Equal,
    In,
    NotIn,
    Lt,
    Gt,
    Lte,
    Gte,
    Contains,
}

/// Target of a filter key. Without a column the key itself is the column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterField {
    #[serde(default)]
    pub column: Option<String>,
    pub kind: FilterKind,
}

impl FilterField {
    pub fn new(kind: FilterKind) -> Self {
        Self { column: None, kind }
    }

    pub fn on(column: &str, kind: FilterKind) -> Self {
        Self {
            column: Some(column.to_string()),
            kind,
        }
    }
}

/// One projected column, rendered as `column AS alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectField {
    pub column: String,
    pub alias: Option<String>,
}

impl SelectField {
    pub fn column(column: &str) -> Self {
        Self {
            column: column.to_string(),
            alias: None,
        }
    }

    pub fn aliased(column: &str, alias: &str) -> Self {
        Self {
            column: column.to_string(),
            alias: Some(alias.to_string()),
        }
    }

    pub fn to_sql(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {alias}", self.column),
            None => self.column.clone(),
        }
    }
}

/// Locale-dependent column selection.
pub trait ProjectionRule: Send + Sync {
    fn select(&self, locale: &str) -> Vec<SelectField>;
}

impl<F> ProjectionRule for F
where
    F: Fn(&str) -> Vec<SelectField> + Send + Sync,
{
    fn select(&self, locale: &str) -> Vec<SelectField> {
        self(locale)
    }
}

/// Render a projection as a select list; `None` or empty means `*`.
pub fn render_projection(rule: Option<&Arc<dyn ProjectionRule>>, locale: &str) -> Option<String> {
    let fields = rule?.select(locale);
    if fields.is_empty() {
        return None;
    }
    Some(
        fields
            .iter()
            .map(SelectField::to_sql)
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Eager-load descriptor: rows of `table` whose `foreign_key` matches the
/// parent's `local_key` are handed to `Entity::attach` under `relation`.
#[derive(Clone)]
pub struct Preload {
    pub relation: String,
    pub table: String,
    pub foreign_key: String,
    pub local_key: String,
    pub projection: Option<Arc<dyn ProjectionRule>>,
    pub include_deleted: bool,
    pub soft_delete_column: Option<String>,
}

impl Preload {
    pub fn new(relation: &str, table: &str, foreign_key: &str) -> Self {
        Self {
            relation: relation.to_string(),
            table: table.to_string(),
            foreign_key: foreign_key.to_string(),
            local_key: "id".to_string(),
            projection: None,
            include_deleted: false,
            soft_delete_column: None,
        }
    }

    pub fn local_key(mut self, column: &str) -> Self {
        self.local_key = column.to_string();
        self
    }

    pub fn projection(mut self, rule: impl ProjectionRule + 'static) -> Self {
        self.projection = Some(Arc::new(rule));
        self
    }

    pub fn soft_deleted_by(mut self, column: &str) -> Self {
        self.soft_delete_column = Some(column.to_string());
        self
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

impl std::fmt::Debug for Preload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preload")
            .field("relation", &self.relation)
            .field("table", &self.table)
            .field("foreign_key", &self.foreign_key)
            .field("local_key", &self.local_key)
            .field("projection", &self.projection.is_some())
            .field("include_deleted", &self.include_deleted)
            .field("soft_delete_column", &self.soft_delete_column)
            .finish()
    }
}

/// The projection and preloads that apply to one call.
#[derive(Clone, Copy)]
pub struct Rules<'a> {
    pub projection: Option<&'a Arc<dyn ProjectionRule>>,
    pub preloads: &'a [Preload],
}

/// Declarative query configuration for one entity.
///
/// Built once, then shared read-only (usually behind an `Arc`) across
/// concurrent calls.
///
/// ```ignore
/// let spec = FilterSpec::new()
///     .filter("status", FilterField::new(FilterKind::Equal))
///     .filter("min_age", FilterField::on("age", FilterKind::Gte))
///     .searchable(&["name", "email"])
///     .default_sort("created_at")
///     .projection(|locale: &str| vec![
///         SelectField::column("id"),
///         SelectField::aliased(&format!("title_{locale}"), "title"),
///     ]);
/// ```
#[derive(Clone, Default)]
pub struct FilterSpec {
    pub filterable: BTreeMap<String, FilterField>,
    pub searchable: Vec<String>,
    pub default_sort: Option<String>,
    pub projection: Option<Arc<dyn ProjectionRule>>,
    pub preloads: Vec<Preload>,
    pub list_projection: Option<Arc<dyn ProjectionRule>>,
    pub list_preloads: Option<Vec<Preload>>,
    pub joins: Vec<String>,
    pub group_by: Vec<String>,
    pub unscoped: bool,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, key: &str, field: FilterField) -> Self {
        self.filterable.insert(key.to_string(), field);
        self
    }

    pub fn searchable(mut self, columns: &[&str]) -> Self {
        self.searchable = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn default_sort(mut self, column: &str) -> Self {
        self.default_sort = Some(column.to_string());
        self
    }

    pub fn projection(mut self, rule: impl ProjectionRule + 'static) -> Self {
        self.projection = Some(Arc::new(rule));
        self
    }

    pub fn preload(mut self, preload: Preload) -> Self {
        self.preloads.push(preload);
        self
    }

    /// Projection used only by listing operations.
    pub fn list_projection(mut self, rule: impl ProjectionRule + 'static) -> Self {
        self.list_projection = Some(Arc::new(rule));
        self
    }

    /// Preloads used only by listing operations.
    pub fn list_preloads(mut self, preloads: Vec<Preload>) -> Self {
        self.list_preloads = Some(preloads);
        self
    }

    pub fn join(mut self, clause: &str) -> Self {
        self.joins.push(clause.to_string());
        self
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.to_string());
        self
    }

    /// Include soft-deleted rows in every call made with this spec.
    pub fn unscoped(mut self) -> Self {
        self.unscoped = true;
        self
    }

    /// Rules for a call: listings prefer the list overrides when present.
    pub fn rules(&self, listing: bool) -> Rules<'_> {
        let projection = if listing {
            self.list_projection.as_ref().or(self.projection.as_ref())
        } else {
            self.projection.as_ref()
        };
        let preloads = match (&self.list_preloads, listing) {
            (Some(list), true) => list.as_slice(),
            _ => self.preloads.as_slice(),
        };
        Rules {
            projection,
            preloads,
        }
    }
}

impl std::fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterSpec")
            .field("filterable", &self.filterable)
            .field("searchable", &self.searchable)
            .field("default_sort", &self.default_sort)
            .field("projection", &self.projection.is_some())
            .field("preloads", &self.preloads)
            .field("list_projection", &self.list_projection.is_some())
            .field("list_preloads", &self.list_preloads)
            .field("joins", &self.joins)
            .field("group_by", &self.group_by)
            .field("unscoped", &self.unscoped)
            .finish()
    }
}
