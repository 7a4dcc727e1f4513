use crate::query::QueryError;

/// Errors that can occur in the data layer.
#[derive(Debug)]
pub enum DataError {
    NotFound(String),
    /// Unresolvable identity, unsupported identifier type or invalid
    /// mapping. Raised before any backend call.
    Configuration(String),
    /// Opaque backend failure, passed through untranslated.
    Database(Box<dyn std::error::Error + Send + Sync>),
    Cancelled,
    DeadlineExceeded,
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates (e.g. `sift-data-sqlx`) to wrap driver-specific
    /// errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        DataError::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, DataError::Configuration(_))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Cancelled => write!(f, "Operation cancelled"),
            DataError::DeadlineExceeded => write!(f, "Deadline exceeded"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<QueryError> for DataError {
    fn from(err: QueryError) -> Self {
        DataError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display() {
        assert_eq!(DataError::Cancelled.to_string(), "Operation cancelled");
        assert_eq!(
            DataError::configuration("no id").to_string(),
            "Configuration error: no id"
        );
    }

    #[test]
    fn test_database_source() {
        let err = DataError::database(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(err.to_string(), "Database error: boom");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_query_error_is_configuration() {
        let err: DataError = QueryError::InvalidIdentifier {
            kind: "column",
            ident: "a b".into(),
        }
        .into();
        assert!(err.is_configuration());
    }
}
