//! Filter compiler: turns a [`QueryRequest`] into a [`Condition`] using the
//! entity's [`FilterSpec`]. Pure and deterministic.

use crate::condition::Condition;
use crate::request::QueryRequest;
use crate::spec::{FilterKind, FilterSpec};
use crate::value::Value;

/// Compile the search term and filter map of `request`.
///
/// The search term becomes one OR-group of case-insensitive substring
/// matches over the searchable columns. Each filter key declared in
/// `spec.filterable` becomes one leaf; undeclared keys and null values are
/// dropped. Keys are visited in lexicographic order.
pub fn compile(request: &QueryRequest, spec: &FilterSpec) -> Condition {
    let mut condition = Condition::default();

    if let Some(term) = request.search_term() {
        if !spec.searchable.is_empty() {
            let group = spec
                .searchable
                .iter()
                .fold(Condition::default(), |group, column| {
                    group.or(Condition::contains(column, term))
                });
            condition = condition.and(group);
        }
    }

    for (key, value) in &request.filters {
        let Some(field) = spec.filterable.get(key) else {
            tracing::trace!(filter = %key, "Dropping undeclared filter key");
            continue;
        };
        if value.is_null() {
            continue;
        }
        let column = field.column.as_deref().unwrap_or(key);
        condition = condition.and(leaf(column, field.kind, value.clone()));
    }

    condition
}

fn leaf(column: &str, kind: FilterKind, value: Value) -> Condition {
    match kind {
        FilterKind::Equal => match value {
            list @ Value::List(_) => Condition::in_list(column, list),
            scalar => Condition::eq(column, scalar),
        },
        FilterKind::In => Condition::in_list(column, value),
        FilterKind::NotIn => Condition::not_in(column, value),
        FilterKind::Lt => Condition::lt(column, value),
        FilterKind::Gt => Condition::gt(column, value),
        FilterKind::Lte => Condition::lte(column, value),
        FilterKind::Gte => Condition::gte(column, value),
        FilterKind::Contains => Condition::contains(column, &value.to_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FilterField;

    fn spec() -> FilterSpec {
        FilterSpec::new()
            .filter("status", FilterField::new(FilterKind::Equal))
            .filter("roles", FilterField::on("role", FilterKind::In))
            .filter("min_age", FilterField::on("age", FilterKind::Gte))
            .filter("name", FilterField::new(FilterKind::Contains))
            .searchable(&["name", "email"])
    }

    #[test]
    fn test_search_group() {
        let request = QueryRequest::new().searching("John");
        let compiled = compile(&request, &spec()).build();
        assert_eq!(
            compiled.fragment,
            "(LOWER(name) LIKE ? OR LOWER(email) LIKE ?)"
        );
        assert_eq!(
            compiled.args,
            vec![Value::from("%john%"), Value::from("%john%")]
        );
    }

    #[test]
    fn test_unknown_keys_are_dropped() {
        let request = QueryRequest::new().filter("bogus", "x");
        assert!(compile(&request, &spec()).build().is_empty());

        let request = QueryRequest::new()
            .filter("bogus", "x")
            .filter("status", "active");
        let compiled = compile(&request, &spec()).build();
        assert_eq!(compiled.fragment, "status = ?");
        assert_eq!(compiled.args, vec![Value::from("active")]);
    }

    #[test]
    fn test_search_and_filters_combined_in_key_order() {
        let request = QueryRequest::new()
            .searching("jo")
            .filter("status", "active")
            .filter("min_age", 18)
            .filter("roles", vec!["admin", "editor"]);
        let compiled = compile(&request, &spec()).build();
        assert_eq!(
            compiled.fragment,
            "(LOWER(name) LIKE ? OR LOWER(email) LIKE ?) AND age >= ? AND role IN (?) AND status = ?"
        );
        assert_eq!(compiled.args.len(), 5);
        assert_eq!(compiled.args[2], Value::Int(18));
    }

    #[test]
    fn test_search_ignored_without_searchable_columns() {
        let request = QueryRequest::new().searching("jo");
        assert!(compile(&request, &FilterSpec::new()).is_empty());
    }

    #[test]
    fn test_scalar_in_and_textual_contains() {
        let request = QueryRequest::new().filter("roles", "admin").filter("name", 42);
        let compiled = compile(&request, &spec()).build();
        assert_eq!(compiled.fragment, "LOWER(name) LIKE ? AND role IN (?)");
        assert_eq!(
            compiled.args,
            vec![Value::from("%42%"), Value::from(vec!["admin"])]
        );
    }

    #[test]
    fn test_null_filter_value_skipped() {
        let request = QueryRequest::new().filter("status", Value::Null);
        assert!(compile(&request, &spec()).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let request = QueryRequest::new()
            .searching("a")
            .filter("status", "x")
            .filter("roles", vec!["r"]);
        assert_eq!(compile(&request, &spec()).build(), compile(&request, &spec()).build());
    }
}
