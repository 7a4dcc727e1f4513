//! Composable boolean predicates.
//!
//! A [`Condition`] is an ordered list of parts. The first part stands alone;
//! every later part is tied to the previous ones by `AND` or `OR`. A part is
//! either a leaf (a fragment with `?` placeholders plus its bound arguments)
//! or a nested group (another `Condition`).
//!
//! ```ignore
//! // status = ? AND (role = ? OR role = ?)
//! let cond = Condition::eq("status", "active").and(
//!     Condition::eq("role", "admin").or(Condition::eq("role", "moderator")),
//! );
//! let compiled = cond.build();
//! assert_eq!(compiled.fragment, "status = ? AND (role = ? OR role = ?)");
//! ```
//!
//! Column names are interpolated as-is. Only values are bound, so column
//! names must never come from untrusted input.

use crate::value::Value;

/// The operator joining a part to the parts before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn as_str(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        fragment: String,
        args: Vec<Value>,
        raw: bool,
    },
    Group(Condition),
}

#[derive(Debug, Clone, PartialEq)]
struct Part {
    connective: Option<Connective>,
    node: Node,
}

/// A composable predicate compiled into a [`Compiled`] fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    parts: Vec<Part>,
}

/// A compiled predicate: fragment with `?` placeholders and its arguments in
/// placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compiled {
    pub fragment: String,
    pub args: Vec<Value>,
}

impl Compiled {
    pub fn is_empty(&self) -> bool {
        self.fragment.is_empty()
    }
}

impl Condition {
    fn leaf(fragment: String, args: Vec<Value>) -> Self {
        Self {
            parts: vec![Part {
                connective: None,
                node: Node::Leaf {
                    fragment,
                    args,
                    raw: false,
                },
            }],
        }
    }

    /// `column = value`
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::leaf(format!("{column} = ?"), vec![value.into()])
    }

    /// `column != value`
    pub fn ne(column: &str, value: impl Into<Value>) -> Self {
        Self::leaf(format!("{column} != ?"), vec![value.into()])
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::leaf(format!("{column} > ?"), vec![value.into()])
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Self::leaf(format!("{column} >= ?"), vec![value.into()])
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self::leaf(format!("{column} < ?"), vec![value.into()])
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Self::leaf(format!("{column} <= ?"), vec![value.into()])
    }

    /// `column IN (?)`. The whole list is bound to a single placeholder; a
    /// scalar is treated as a one-element list.
    pub fn in_list(column: &str, values: impl Into<Value>) -> Self {
        let values = Value::List(values.into().into_list());
        Self::leaf(format!("{column} IN (?)"), vec![values])
    }

    /// `column NOT IN (?)`. An empty list excludes nothing.
    pub fn not_in(column: &str, values: impl Into<Value>) -> Self {
        let values = values.into().into_list();
        if values.is_empty() {
            return Self::leaf("1 = 1".to_string(), Vec::new());
        }
        Self::leaf(format!("{column} NOT IN (?)"), vec![Value::List(values)])
    }

    /// `column LIKE pattern`, pattern passed through untouched.
    pub fn like(column: &str, pattern: &str) -> Self {
        Self::leaf(format!("{column} LIKE ?"), vec![Value::from(pattern)])
    }

    /// Case-insensitive `LIKE`: both the column and the pattern are lowered.
    pub fn ilike(column: &str, pattern: &str) -> Self {
        Self::leaf(
            format!("LOWER({column}) LIKE ?"),
            vec![Value::Text(pattern.to_lowercase())],
        )
    }

    /// Case-insensitive substring match.
    pub fn contains(column: &str, needle: &str) -> Self {
        Self::ilike(column, &format!("%{needle}%"))
    }

    /// Case-insensitive prefix match.
    pub fn starts_with(column: &str, prefix: &str) -> Self {
        Self::ilike(column, &format!("{prefix}%"))
    }

    /// Case-insensitive suffix match.
    pub fn ends_with(column: &str, suffix: &str) -> Self {
        Self::ilike(column, &format!("%{suffix}"))
    }

    pub fn is_null(column: &str) -> Self {
        Self::leaf(format!("{column} IS NULL"), Vec::new())
    }

    pub fn is_not_null(column: &str) -> Self {
        Self::leaf(format!("{column} IS NOT NULL"), Vec::new())
    }

    pub fn between(column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::leaf(
            format!("{column} BETWEEN ? AND ?"),
            vec![low.into(), high.into()],
        )
    }

    pub fn not_between(column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::leaf(
            format!("{column} NOT BETWEEN ? AND ?"),
            vec![low.into(), high.into()],
        )
    }

    /// Raw fragment with explicit bound arguments.
    ///
    /// ```ignore
    /// Condition::raw("age > ? AND age < ?", vec![18.into(), 65.into()])
    /// ```
    pub fn raw(fragment: &str, args: Vec<Value>) -> Self {
        Self {
            parts: vec![Part {
                connective: None,
                node: Node::Leaf {
                    fragment: fragment.to_string(),
                    args,
                    raw: true,
                },
            }],
        }
    }

    /// Appends `other` as a group joined with `AND`. `None` is a no-op.
    pub fn and(self, other: impl Into<Option<Condition>>) -> Self {
        self.push(Connective::And, other.into())
    }

    /// Appends `other` as a group joined with `OR`. `None` is a no-op.
    pub fn or(self, other: impl Into<Option<Condition>>) -> Self {
        self.push(Connective::Or, other.into())
    }

    fn push(mut self, connective: Connective, other: Option<Condition>) -> Self {
        if let Some(group) = other {
            let connective = if self.parts.is_empty() {
                None
            } else {
                Some(connective)
            };
            self.parts.push(Part {
                connective,
                node: Node::Group(group),
            });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Whether the compiled fragment has a top-level connective and needs
    /// parentheses when ANDed with other predicates.
    ///
    /// A lone raw fragment counts as composite since its content may carry
    /// its own `AND`/`OR`.
    pub fn is_composite(&self) -> bool {
        match self.parts.as_slice() {
            [] => false,
            [Part {
                node: Node::Leaf { raw, .. },
                ..
            }] => *raw,
            [Part {
                node: Node::Group(inner),
                ..
            }] => inner.parts.len() <= 1 && !inner.is_raw_leaf() && inner.is_composite(),
            _ => true,
        }
    }

    /// Compiles the condition depth-first, left to right.
    pub fn build(&self) -> Compiled {
        let (fragment, args) = self.compile();
        Compiled { fragment, args }
    }

    fn compile(&self) -> (String, Vec<Value>) {
        let mut segments: Vec<String> = Vec::with_capacity(self.parts.len() * 2);
        let mut args = Vec::new();

        for part in &self.parts {
            let (fragment, part_args) = match &part.node {
                Node::Leaf { fragment, args, .. } => (fragment.clone(), args.clone()),
                Node::Group(group) => {
                    let (inner, inner_args) = group.compile();
                    if group.parts.len() > 1 || group.is_raw_leaf() {
                        (format!("({inner})"), inner_args)
                    } else {
                        (inner, inner_args)
                    }
                }
            };
            if fragment.is_empty() || fragment == "()" {
                continue;
            }
            if let Some(connective) = part.connective {
                if !segments.is_empty() {
                    segments.push(connective.as_str().to_string());
                }
            }
            segments.push(fragment);
            args.extend(part_args);
        }

        (segments.join(" "), args)
    }

    fn is_raw_leaf(&self) -> bool {
        matches!(
            self.parts.as_slice(),
            [Part {
                node: Node::Leaf { raw: true, .. },
                ..
            }]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_leaves_joined_without_parens() {
        let c = Condition::eq("a", 1).and(Condition::eq("b", 2)).build();
        assert_eq!(c.fragment, "a = ? AND b = ?");
        assert_eq!(c.args, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_nested_composite_is_parenthesised() {
        let c = Condition::eq("a", 1)
            .and(Condition::eq("b", 2).or(Condition::eq("c", 3)))
            .build();
        assert_eq!(c.fragment, "a = ? AND (b = ? OR c = ?)");
        assert_eq!(c.args, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_chaining_accumulates_left_to_right() {
        let c = Condition::eq("a", 1)
            .and(Condition::eq("b", 2))
            .or(Condition::eq("c", 3))
            .build();
        assert_eq!(c.fragment, "a = ? AND b = ? OR c = ?");
    }

    #[test]
    fn test_none_operand_is_noop() {
        let base = Condition::eq("a", 1);
        let c = base.clone().and(None).or(None);
        assert_eq!(c, base);
    }

    #[test]
    fn test_build_is_idempotent() {
        let cond = Condition::eq("a", 1).and(Condition::in_list("b", vec![1, 2]).or(Condition::is_null("c")));
        assert_eq!(cond.build(), cond.build());
    }

    #[test]
    fn test_empty_condition_compiles_empty() {
        let c = Condition::default().build();
        assert!(c.is_empty());
        assert!(c.args.is_empty());
    }

    #[test]
    fn test_empty_group_is_skipped_with_connective() {
        let c = Condition::eq("a", 1).and(Condition::default()).build();
        assert_eq!(c.fragment, "a = ?");
    }

    #[test]
    fn test_composing_onto_empty_drops_leading_connective() {
        let c = Condition::default()
            .and(Condition::eq("a", 1))
            .and(Condition::eq("b", 2))
            .build();
        assert_eq!(c.fragment, "a = ? AND b = ?");
    }

    #[test]
    fn test_in_list_binds_single_list_argument() {
        let c = Condition::in_list("role", vec!["admin", "editor"]).build();
        assert_eq!(c.fragment, "role IN (?)");
        assert_eq!(c.args, vec![Value::from(vec!["admin", "editor"])]);
    }

    #[test]
    fn test_not_in_empty_matches_everything() {
        let c = Condition::not_in("id", Vec::<i64>::new()).build();
        assert_eq!(c.fragment, "1 = 1");
    }

    #[test]
    fn test_case_insensitive_matchers_lower_literal() {
        assert_eq!(
            Condition::contains("name", "JoHn").build().args,
            vec![Value::from("%john%")]
        );
        assert_eq!(
            Condition::starts_with("name", "Jo").build().args,
            vec![Value::from("jo%")]
        );
        let c = Condition::ends_with("name", "HN").build();
        assert_eq!(c.fragment, "LOWER(name) LIKE ?");
        assert_eq!(c.args, vec![Value::from("%hn")]);
        assert_eq!(
            Condition::ilike("name", "%John%").build().args,
            vec![Value::from("%john%")]
        );
    }

    #[test]
    fn test_range_and_null_checks() {
        let c = Condition::between("age", 18, 65)
            .and(Condition::is_not_null("email"))
            .and(Condition::not_between("score", 0, 10))
            .build();
        assert_eq!(
            c.fragment,
            "age BETWEEN ? AND ? AND email IS NOT NULL AND score NOT BETWEEN ? AND ?"
        );
        assert_eq!(c.args.len(), 4);
    }

    #[test]
    fn test_nested_raw_fragment_is_parenthesised() {
        let c = Condition::eq("a", 1)
            .and(Condition::raw("x = ? OR y = ?", vec![2.into(), 3.into()]))
            .build();
        assert_eq!(c.fragment, "a = ? AND (x = ? OR y = ?)");
    }

    #[test]
    fn test_top_level_raw_stays_bare() {
        let c = Condition::raw("json_extract(data, '$.role') = ?", vec!["admin".into()]).build();
        assert_eq!(c.fragment, "json_extract(data, '$.role') = ?");
    }

    #[test]
    fn test_is_composite() {
        assert!(!Condition::eq("a", 1).is_composite());
        assert!(Condition::eq("a", 1).or(Condition::eq("b", 2)).is_composite());
        assert!(Condition::raw("a = 1", vec![]).is_composite());
        assert!(!Condition::default().is_composite());
        // already wrapped by compile
        let wrapped = Condition::default().and(Condition::eq("a", 1).or(Condition::eq("b", 2)));
        assert_eq!(wrapped.build().fragment, "(a = ? OR b = ?)");
        assert!(!wrapped.is_composite());
    }
}
