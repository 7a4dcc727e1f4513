use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::error::DataError;
use crate::query::is_valid_identifier;
use crate::value::Value;

/// Trait representing a database entity with a table name, id column, and column list.
///
/// # Example
///
/// ```ignore
/// impl Entity for User {
///     type Id = i64;
///     fn table_name() -> &'static str { "users" }
///     fn columns() -> &'static [&'static str] { &["id", "name", "email", "deleted_at"] }
///     fn id(&self) -> &i64 { &self.id }
///     fn soft_delete_column() -> Option<&'static str> { Some("deleted_at") }
///     fn column_values(&self) -> Vec<(&'static str, Value)> {
///         vec![("name", self.name.clone().into()), ("email", self.email.clone().into())]
///     }
/// }
/// ```
pub trait Entity: Send + Sync + Unpin + 'static {
    type Id: Identifier;

    fn table_name() -> &'static str;

    fn id_column() -> &'static str {
        "id"
    }

    fn columns() -> &'static [&'static str];

    fn id(&self) -> &Self::Id;

    /// Logical-deletion marker column. Rows with a non-null marker are
    /// hidden unless a call is unscoped.
    fn soft_delete_column() -> Option<&'static str> {
        None
    }

    /// Columns written on insert, in order. Leave the id column out when the
    /// backend assigns it.
    fn column_values(&self) -> Vec<(&'static str, Value)>;

    /// Value of `column` on this instance, used to match eager-loaded rows.
    fn key_value(&self, column: &str) -> Option<Value> {
        if column == Self::id_column() {
            return Some(self.id().to_id_value().into());
        }
        self.column_values()
            .into_iter()
            .find_map(|(name, value)| (name == column).then_some(value))
    }

    /// Receive eager-loaded rows for `relation`.
    fn attach(&mut self, relation: &str, records: Vec<Record>) -> Result<(), DataError> {
        let _ = records;
        Err(DataError::configuration(format!(
            "{} does not accept relation '{relation}'",
            Self::table_name()
        )))
    }
}

/// Identity value read from or bound to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdValue {
    Text(String),
    Int(i64),
    UInt(u64),
}

impl IdValue {
    /// Narrow a backend value to an identity. Anything but text or an
    /// integer is a configuration error.
    pub fn from_value(value: Value) -> Result<Self, DataError> {
        match value {
            Value::Text(s) => Ok(IdValue::Text(s)),
            Value::Int(i) => Ok(IdValue::Int(i)),
            Value::UInt(u) => Ok(IdValue::UInt(u)),
            other => Err(DataError::configuration(format!(
                "unsupported identifier type: {}",
                other.kind()
            ))),
        }
    }
}

impl From<IdValue> for Value {
    fn from(id: IdValue) -> Self {
        match id {
            IdValue::Text(s) => Value::Text(s),
            IdValue::Int(i) => Value::Int(i),
            IdValue::UInt(u) => Value::UInt(u),
        }
    }
}

/// Primary-key types accepted by the engine: text, signed and unsigned integers.
pub trait Identifier: Clone + Send + Sync + std::fmt::Debug + 'static {
    fn to_id_value(&self) -> IdValue;
    fn from_id_value(value: IdValue) -> Result<Self, DataError>;
}

impl Identifier for String {
    fn to_id_value(&self) -> IdValue {
        IdValue::Text(self.clone())
    }

    fn from_id_value(value: IdValue) -> Result<Self, DataError> {
        match value {
            IdValue::Text(s) => Ok(s),
            other => Err(id_mismatch("text", &other)),
        }
    }
}

macro_rules! impl_signed_identifier {
    ($($ty:ty),*) => {
        $(
            impl Identifier for $ty {
                fn to_id_value(&self) -> IdValue {
                    IdValue::Int(i64::from(*self))
                }

                fn from_id_value(value: IdValue) -> Result<Self, DataError> {
                    let converted = match &value {
                        IdValue::Int(i) => <$ty>::try_from(*i).ok(),
                        IdValue::UInt(u) => <$ty>::try_from(*u).ok(),
                        IdValue::Text(_) => None,
                    };
                    converted.ok_or_else(|| id_mismatch(stringify!($ty), &value))
                }
            }
        )*
    };
}

macro_rules! impl_unsigned_identifier {
    ($($ty:ty),*) => {
        $(
            impl Identifier for $ty {
                fn to_id_value(&self) -> IdValue {
                    IdValue::UInt(u64::from(*self))
                }

                fn from_id_value(value: IdValue) -> Result<Self, DataError> {
                    let converted = match &value {
                        IdValue::Int(i) => <$ty>::try_from(*i).ok(),
                        IdValue::UInt(u) => <$ty>::try_from(*u).ok(),
                        IdValue::Text(_) => None,
                    };
                    converted.ok_or_else(|| id_mismatch(stringify!($ty), &value))
                }
            }
        )*
    };
}

impl_signed_identifier!(i32, i64);
impl_unsigned_identifier!(u32, u64);

fn id_mismatch(expected: &str, got: &IdValue) -> DataError {
    DataError::configuration(format!("identifier {got:?} does not fit {expected}"))
}

/// Resolve and validate the identity column of `T`.
pub fn identity_column<T: Entity>() -> Result<&'static str, DataError> {
    let column = T::id_column();
    if column.is_empty() || !is_valid_identifier(column, false) {
        return Err(DataError::configuration(format!(
            "{} has no usable identity column",
            T::table_name()
        )));
    }
    if !T::columns().contains(&column) {
        return Err(DataError::configuration(format!(
            "identity column '{column}' is not a column of {}",
            T::table_name()
        )));
    }
    Ok(column)
}

/// A decoded row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserialize the row into any `serde` type.
    pub fn deserialize<D: DeserializeOwned>(self) -> Result<D, DataError> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .0
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::from(v)))
            .collect();
        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| DataError::Other(format!("cannot decode record: {e}")))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
