use crate::entity::Entity;
use crate::value::Value;

/// Column assignments for an UPDATE, in insertion order.
///
/// ```ignore
/// let changes = Changes::new().set("status", "archived").set("archived_at", Value::Null);
/// repo.update(&cx, &Condition::eq("owner_id", 7), &changes).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    assignments: Vec<(String, Value)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` to `column`, replacing an earlier assignment of it.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.assignments.iter_mut().find(|(c, _)| c == column) {
            Some((_, existing)) => *existing = value,
            None => self.assignments.push((column.to_string(), value)),
        }
        self
    }

    /// Every written column of `entity` except its identity.
    pub fn from_entity<T: Entity>(entity: &T) -> Self {
        entity
            .column_values()
            .into_iter()
            .filter(|(column, _)| *column != T::id_column())
            .fold(Self::new(), |changes, (column, value)| changes.set(column, value))
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.assignments.iter().map(|(c, v)| (c.as_str(), v))
    }
}
