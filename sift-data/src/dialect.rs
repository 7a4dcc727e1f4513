use serde::Deserialize;

use crate::value::Value;

/// SQL dialect used when rendering statements for a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Generic SQL using `?` placeholders (default).
    #[default]
    Generic,
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// MySQL-style `?` placeholders, `ON DUPLICATE KEY` upserts, no `RETURNING`.
    MySql,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

/// A rendered statement ready to be handed to a driver.
///
/// After [`Dialect::render`], `args` only holds scalars: lists have been
/// expanded and nulls inlined as `NULL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Dialect {
    /// Infer the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Self {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::MySql,
            "sqlite" => Dialect::Sqlite,
            _ => Dialect::Generic,
        }
    }

    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Generic | Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }

    pub fn supports_returning(self) -> bool {
        !matches!(self, Dialect::MySql)
    }

    /// Render a `?`-placeholder statement for this dialect.
    ///
    /// `List` arguments expand into one placeholder per element (an empty
    /// list becomes `NULL`), `Null` arguments are inlined, and placeholders
    /// are renumbered for Postgres. Question marks inside quoted literals or
    /// quoted identifiers are left alone.
    pub fn render(self, sql: &str, args: Vec<Value>) -> Statement {
        let mut out = String::with_capacity(sql.len() + args.len() * 2);
        let mut bound = Vec::with_capacity(args.len());
        let mut args = args.into_iter();
        let mut quote: Option<char> = None;

        for ch in sql.chars() {
            if let Some(q) = quote {
                out.push(ch);
                if ch == q {
                    quote = None;
                }
                continue;
            }
            match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                '?' => match args.next() {
                    Some(value) => self.push_value(&mut out, &mut bound, value),
                    None => out.push('?'),
                },
                _ => out.push(ch),
            }
        }

        Statement { sql: out, args: bound }
    }

    fn push_value(self, out: &mut String, bound: &mut Vec<Value>, value: Value) {
        match value {
            Value::Null => out.push_str("NULL"),
            Value::List(items) if items.is_empty() => out.push_str("NULL"),
            Value::List(items) => {
                for (i, item) in items.into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.push_value(out, bound, item);
                }
            }
            scalar => {
                bound.push(scalar);
                out.push_str(&self.placeholder(bound.len()));
            }
        }
    }
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_passthrough() {
        let stmt = Dialect::Generic.render("a = ? AND b = ?", vec![1.into(), "x".into()]);
        assert_eq!(stmt.sql, "a = ? AND b = ?");
        assert_eq!(stmt.args, vec![Value::Int(1), Value::from("x")]);
    }

    #[test]
    fn test_postgres_renumbers_and_expands_lists() {
        let stmt = Dialect::Postgres.render(
            "status = ? AND role IN (?)",
            vec!["active".into(), Value::from(vec!["admin", "user"])],
        );
        assert_eq!(stmt.sql, "status = $1 AND role IN ($2, $3)");
        assert_eq!(stmt.args.len(), 3);
    }

    #[test]
    fn test_empty_list_and_null_are_inlined() {
        let stmt = Dialect::Sqlite.render(
            "id IN (?) OR parent = ?",
            vec![Value::List(vec![]), Value::Null],
        );
        assert_eq!(stmt.sql, "id IN (NULL) OR parent = NULL");
        assert!(stmt.args.is_empty());
    }

    #[test]
    fn test_question_marks_inside_literals_untouched() {
        let stmt = Dialect::Postgres.render("note = 'why?' AND \"odd?\" = ?", vec![1.into()]);
        assert_eq!(stmt.sql, "note = 'why?' AND \"odd?\" = $1");
    }

    #[test]
    fn test_from_url() {
        assert_eq!(Dialect::from_url("postgres://u@h/db"), Dialect::Postgres);
        assert_eq!(Dialect::from_url("sqlite::memory:"), Dialect::Sqlite);
        assert_eq!(Dialect::from_url("mysql://h/db"), Dialect::MySql);
        assert_eq!(Dialect::from_url("odbc://x"), Dialect::Generic);
    }
}
