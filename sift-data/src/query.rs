use crate::condition::Condition;
use crate::dialect::{Dialect, Statement};
use crate::page::SortDirection;
use crate::value::Value;

/// A fluent builder for SELECT and COUNT statements over one table.
///
/// Predicates are added as [`Condition`]s and ANDed together. When more than
/// one predicate is present, composite ones are parenthesised so that an
/// `OR` inside a user condition never escapes a soft-delete scope.
///
/// # Example
///
/// ```ignore
/// let stmt = QueryBuilder::new("users")
///     .where_condition(&Condition::eq("status", "active"))
///     .where_null("users.deleted_at")
///     .order_by("created_at", SortDirection::Desc)
///     .limit(10)
///     .build_select("*");
/// assert_eq!(
///     stmt.sql,
///     "SELECT * FROM users WHERE status = ? AND users.deleted_at IS NULL ORDER BY created_at DESC LIMIT 10"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    joins: Vec<String>,
    predicates: Vec<WhereClause>,
    group_by: Vec<String>,
    order: Vec<(String, SortDirection)>,
    limit_val: Option<u64>,
    offset_val: Option<u64>,
    dialect: Dialect,
}

/// One ANDed member of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    fragment: String,
    args: Vec<Value>,
    composite: bool,
}

impl WhereClause {
    pub fn from_condition(condition: &Condition) -> Option<Self> {
        let compiled = condition.build();
        if compiled.is_empty() {
            return None;
        }
        Some(Self {
            fragment: compiled.fragment,
            args: compiled.args,
            composite: condition.is_composite(),
        })
    }
}

impl QueryBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            joins: Vec::new(),
            predicates: Vec::new(),
            group_by: Vec::new(),
            order: Vec::new(),
            limit_val: None,
            offset_val: None,
            dialect: Dialect::Generic,
        }
    }

    /// Create a new builder with an explicit SQL dialect.
    pub fn new_with_dialect(table: &str, dialect: Dialect) -> Self {
        Self::new(table).dialect(dialect)
    }

    /// Set the SQL dialect (affects placeholder style and list expansion).
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Append a raw join clause, e.g. `LEFT JOIN roles ON roles.id = users.role_id`.
    pub fn join(mut self, clause: &str) -> Self {
        self.joins.push(clause.to_string());
        self
    }

    pub fn where_condition(mut self, condition: &Condition) -> Self {
        if let Some(clause) = WhereClause::from_condition(condition) {
            self.predicates.push(clause);
        }
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.predicates.push(WhereClause {
            fragment: format!("{column} IS NULL"),
            args: Vec::new(),
            composite: false,
        });
        self
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.to_string());
        self
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_val = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset_val = Some(offset);
        self
    }

    pub fn has_predicates(&self) -> bool {
        !self.predicates.is_empty()
    }

    /// Build a SELECT statement.
    ///
    /// The `columns` parameter determines which columns to select (e.g., `"*"` or `"id, name"`).
    pub fn build_select(&self, columns: &str) -> Statement {
        let mut sql = format!("SELECT {columns} FROM {}", self.table);
        let mut args = Vec::new();
        self.append_joins(&mut sql);
        self.append_where(&mut sql, &mut args);
        self.append_group(&mut sql);
        self.append_order(&mut sql);
        self.append_limit_offset(&mut sql);
        self.dialect.render(&sql, args)
    }

    /// Build a COUNT statement sharing the joins, WHERE and GROUP BY of the
    /// select but ignoring order and limits.
    ///
    /// A grouped query counts groups, not rows.
    pub fn build_count(&self) -> Statement {
        let mut args = Vec::new();
        let sql = if self.group_by.is_empty() {
            let mut sql = format!("SELECT COUNT(*) FROM {}", self.table);
            self.append_joins(&mut sql);
            self.append_where(&mut sql, &mut args);
            sql
        } else {
            let mut inner = format!("SELECT 1 FROM {}", self.table);
            self.append_joins(&mut inner);
            self.append_where(&mut inner, &mut args);
            self.append_group(&mut inner);
            format!("SELECT COUNT(*) FROM ({inner}) AS grouped")
        };
        self.dialect.render(&sql, args)
    }

    /// Build a single-column SELECT, keeping order and limits.
    pub fn build_pluck(&self, column: &str) -> Statement {
        self.build_select(column)
    }

    /// Render only the WHERE part (without the keyword), for statements
    /// other than SELECT. Returns `None` when there are no predicates.
    pub fn where_sql(&self) -> Option<(String, Vec<Value>)> {
        if self.predicates.is_empty() {
            return None;
        }
        let mut sql = String::new();
        let mut args = Vec::new();
        self.push_predicates(&mut sql, &mut args);
        Some((sql, args))
    }

    fn append_joins(&self, sql: &mut String) {
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
    }

    fn append_where(&self, sql: &mut String, args: &mut Vec<Value>) {
        if self.predicates.is_empty() {
            return;
        }
        sql.push_str(" WHERE ");
        self.push_predicates(sql, args);
    }

    fn push_predicates(&self, sql: &mut String, args: &mut Vec<Value>) {
        let wrap = self.predicates.len() > 1;
        let mut first = true;
        for clause in &self.predicates {
            if !first {
                sql.push_str(" AND ");
            }
            first = false;
            if wrap && clause.composite {
                sql.push('(');
                sql.push_str(&clause.fragment);
                sql.push(')');
            } else {
                sql.push_str(&clause.fragment);
            }
            args.extend(clause.args.iter().cloned());
        }
    }

    fn append_group(&self, sql: &mut String) {
        if self.group_by.is_empty() {
            return;
        }
        sql.push_str(" GROUP BY ");
        sql.push_str(&self.group_by.join(", "));
    }

    fn append_order(&self, sql: &mut String) {
        if self.order.is_empty() {
            return;
        }
        sql.push_str(" ORDER BY ");
        let clauses: Vec<_> = self
            .order
            .iter()
            .map(|(col, dir)| format!("{col} {}", dir.as_sql()))
            .collect();
        sql.push_str(&clauses.join(", "));
    }

    fn append_limit_offset(&self, sql: &mut String) {
        if let Some(limit) = self.limit_val {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset_val {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidIdentifier { kind: &'static str, ident: String },
    EmptyAssignment,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::InvalidIdentifier { kind, ident } => {
                write!(f, "Invalid {kind} identifier: {ident}")
            }
            QueryError::EmptyAssignment => write!(f, "No columns to write"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Check an identifier, returning a `QueryError` naming its `kind` on failure.
pub fn check_identifier(ident: &str, kind: &'static str) -> Result<(), QueryError> {
    if is_valid_identifier(ident, false) {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier {
            kind,
            ident: ident.to_string(),
        })
    }
}

/// Conservative SQL identifier check: dot-separated segments of
/// `[A-Za-z_][A-Za-z0-9_]*`, optionally ending in `*` when `allow_star`.
pub fn is_valid_identifier(ident: &str, allow_star: bool) -> bool {
    if ident.is_empty() {
        return false;
    }
    let parts: Vec<&str> = ident.split('.').collect();
    for (idx, part) in parts.iter().enumerate() {
        if allow_star && *part == "*" {
            return idx + 1 == parts.len();
        }
        if !is_valid_segment(part) {
            return false;
        }
    }
    true
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_select() {
        let stmt = QueryBuilder::new("users").build_select("*");
        assert_eq!(stmt.sql, "SELECT * FROM users");
        assert!(stmt.args.is_empty());
    }

    #[test]
    fn test_complex_query() {
        let stmt = QueryBuilder::new("users")
            .where_condition(&Condition::eq("status", "active").and(Condition::like("name", "%alice%")))
            .order_by("id", SortDirection::Asc)
            .limit(10)
            .offset(20)
            .build_select("id, name");
        assert_eq!(
            stmt.sql,
            "SELECT id, name FROM users WHERE status = ? AND name LIKE ? ORDER BY id ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.args, vec![Value::from("active"), Value::from("%alice%")]);
    }

    #[test]
    fn test_composite_condition_wrapped_next_to_scope() {
        let stmt = QueryBuilder::new("users")
            .where_condition(&Condition::eq("a", 1).or(Condition::eq("b", 2)))
            .where_null("users.deleted_at")
            .build_select("*");
        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE (a = ? OR b = ?) AND users.deleted_at IS NULL"
        );
    }

    #[test]
    fn test_lone_composite_condition_stays_bare() {
        let stmt = QueryBuilder::new("users")
            .where_condition(&Condition::eq("a", 1).or(Condition::eq("b", 2)))
            .build_count();
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM users WHERE a = ? OR b = ?");
    }

    #[test]
    fn test_empty_condition_adds_no_where() {
        let stmt = QueryBuilder::new("users")
            .where_condition(&Condition::default())
            .build_count();
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM users");
    }

    #[test]
    fn test_joins_and_grouped_count() {
        let builder = QueryBuilder::new("users")
            .join("LEFT JOIN posts ON posts.user_id = users.id")
            .where_condition(&Condition::eq("users.status", "active"))
            .group_by("users.id")
            .order_by("users.id", SortDirection::Desc)
            .limit(5);
        assert_eq!(
            builder.build_count().sql,
            "SELECT COUNT(*) FROM (SELECT 1 FROM users LEFT JOIN posts ON posts.user_id = users.id WHERE users.status = ? GROUP BY users.id) AS grouped"
        );
        assert_eq!(
            builder.build_select("users.*").sql,
            "SELECT users.* FROM users LEFT JOIN posts ON posts.user_id = users.id WHERE users.status = ? GROUP BY users.id ORDER BY users.id DESC LIMIT 5"
        );
    }

    #[test]
    fn test_postgres_placeholders() {
        let stmt = QueryBuilder::new_with_dialect("users", Dialect::Postgres)
            .where_condition(
                &Condition::eq("status", "active").and(Condition::in_list("role", vec!["admin", "user"])),
            )
            .build_select("*");
        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE status = $1 AND role IN ($2, $3)"
        );
        assert_eq!(stmt.args.len(), 3);
    }

    #[test]
    fn test_where_sql() {
        let builder = QueryBuilder::new("users")
            .where_condition(&Condition::eq("id", 7))
            .where_null("deleted_at");
        let (sql, args) = builder.where_sql().unwrap();
        assert_eq!(sql, "id = ? AND deleted_at IS NULL");
        assert_eq!(args, vec![Value::Int(7)]);
        assert!(QueryBuilder::new("users").where_sql().is_none());
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("users.email", false));
        assert!(is_valid_identifier("users.*", true));
        assert!(!is_valid_identifier("users.*", false));
        assert!(!is_valid_identifier("name; DROP TABLE users", false));
        assert!(!is_valid_identifier("1abc", false));
        assert!(!is_valid_identifier("", false));
        let err = check_identifier("users;drop", "table").unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { kind: "table", .. }));
    }
}
