use sift_data::DataError;

/// Bridges `sqlx::Error` into `DataError`.
///
/// Row and column shape problems are configuration errors: the entity does
/// not match what the query returned. Everything else is passed through
/// opaque as `DataError::Database`.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match &self {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".into()),
            sqlx::Error::ColumnNotFound(column) => {
                DataError::configuration(format!("column '{column}' missing from result set"))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DataError::configuration(format!("cannot decode column {index}: {source}"))
            }
            _ => DataError::database(self),
        }
    }
}

/// Convenience alias for data-layer results using `DataError`.
pub type SqlxResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            sqlx::Error::RowNotFound.into_data_error(),
            DataError::NotFound(_)
        ));
    }

    #[test]
    fn test_shape_errors_are_configuration() {
        let err = sqlx::Error::ColumnNotFound("age".into()).into_data_error();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = sqlx::Error::Protocol("bad frame".into()).into_data_error();
        assert!(matches!(err, DataError::Database(_)));
        assert!(err.to_string().contains("bad frame"));
    }
}
