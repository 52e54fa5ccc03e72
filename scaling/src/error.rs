use std::error;
use std::fmt;

/// Result type for scaling operations using [`ScalingError`] as the error type.
pub type ScalingResult<T> = Result<T, ScalingError>;

/// Main error type for scaling job preparation.
///
/// A [`ScalingError`] carries an [`ErrorKind`] used for programmatic handling, a static
/// description and optionally a dynamic detail describing the concrete failure.
#[derive(Debug, Clone)]
pub struct ScalingError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
}

/// The two failure families of job preparation.
///
/// Both collapse into the same terminal job status, the distinction is kept for logging
/// and for callers deciding whether retrying without operator action makes sense.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum FailureCategory {
    /// A datastore is not fit to take part in the migration.
    Validation,
    /// A lower level failure while querying metadata or capturing a checkpoint.
    DataAccess,
}

/// Specific categories of errors that can occur while preparing a scaling job.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    InvalidConfiguration,
    UnsupportedDatabaseType,

    // Data Source Check Errors
    DataSourceUnreachable,
    InsufficientPrivilege,
    IncompatibleConfiguration,
    MissingTargetTable,
    MissingTargetColumn,
    MissingSourceTable,

    // Position Errors
    MissingSavedPosition,
    PositionCaptureFailed,

    // Connection & Query Errors
    ConnectionFailed,
    AuthenticationError,
    PermissionDenied,
    QueryFailed,
    OperationCanceled,

    // Data & Serialization Errors
    InvalidData,
    IoError,
    SerializationError,
    DeserializationError,

    // State Errors
    InvalidState,

    // Unknown / Uncategorized
    Unknown,
}

impl ErrorKind {
    /// Returns the failure family this kind belongs to.
    pub fn category(&self) -> FailureCategory {
        match self {
            ErrorKind::InvalidConfiguration
            | ErrorKind::UnsupportedDatabaseType
            | ErrorKind::DataSourceUnreachable
            | ErrorKind::InsufficientPrivilege
            | ErrorKind::IncompatibleConfiguration
            | ErrorKind::MissingTargetTable
            | ErrorKind::MissingTargetColumn
            | ErrorKind::MissingSourceTable
            | ErrorKind::MissingSavedPosition => FailureCategory::Validation,
            ErrorKind::PositionCaptureFailed
            | ErrorKind::ConnectionFailed
            | ErrorKind::AuthenticationError
            | ErrorKind::PermissionDenied
            | ErrorKind::QueryFailed
            | ErrorKind::OperationCanceled
            | ErrorKind::InvalidData
            | ErrorKind::IoError
            | ErrorKind::SerializationError
            | ErrorKind::DeserializationError
            | ErrorKind::InvalidState
            | ErrorKind::Unknown => FailureCategory::DataAccess,
        }
    }
}

impl ScalingError {
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
        }
    }

    /// Shorthand for `self.kind().category()`.
    pub fn category(&self) -> FailureCategory {
        self.kind().category()
    }

    pub fn description(&self) -> &'static str {
        match self.repr {
            ErrorRepr::WithDescription(_, desc) | ErrorRepr::WithDescriptionAndDetail(_, desc, _) => {
                desc
            }
        }
    }

    /// Returns the dynamic detail of this error, if any.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::WithDescription(..) => None,
        }
    }

    /// Re-labels this error with a new kind and description, keeping the original text as
    /// detail.
    ///
    /// Used by checkers to turn a raw data access failure into the validation failure
    /// it signals.
    pub fn with_kind(self, kind: ErrorKind, desc: &'static str) -> ScalingError {
        ScalingError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, self.to_string()),
        }
    }
}

impl PartialEq for ScalingError {
    fn eq(&self, other: &ScalingError) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for ScalingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)
            }
        }
    }
}

impl error::Error for ScalingError {}

impl From<(ErrorKind, &'static str)> for ScalingError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> ScalingError {
        ScalingError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for ScalingError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> ScalingError {
        ScalingError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

impl From<std::io::Error> for ScalingError {
    fn from(err: std::io::Error) -> ScalingError {
        ScalingError::from((ErrorKind::IoError, "I/O error occurred", err.to_string()))
    }
}

impl From<serde_json::Error> for ScalingError {
    fn from(err: serde_json::Error) -> ScalingError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        ScalingError::from((kind, description, err.to_string()))
    }
}

/// Converts [`sqlx::Error`] to [`ScalingError`], classifying database errors by SQLSTATE
/// class.
impl From<sqlx::Error> for ScalingError {
    fn from(err: sqlx::Error) -> ScalingError {
        let (kind, description) = match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // Insufficient privilege.
                Some("42501") => (ErrorKind::PermissionDenied, "PostgreSQL permission denied"),
                Some(code) if code.starts_with("08") => (
                    ErrorKind::ConnectionFailed,
                    "PostgreSQL connection error",
                ),
                Some(code) if code.starts_with("28") => (
                    ErrorKind::AuthenticationError,
                    "PostgreSQL authentication failed",
                ),
                Some(code) if code.starts_with("53") => (
                    ErrorKind::ConnectionFailed,
                    "PostgreSQL resource limitation",
                ),
                Some(code) if code.starts_with("57") => (
                    ErrorKind::OperationCanceled,
                    "PostgreSQL operation canceled",
                ),
                Some(code) if code.starts_with("55") || code.starts_with("25") => {
                    (ErrorKind::InvalidState, "PostgreSQL object or transaction state error")
                }
                _ => (ErrorKind::QueryFailed, "PostgreSQL query failed"),
            },
            sqlx::Error::Configuration(_) => (
                ErrorKind::InvalidConfiguration,
                "Invalid data source configuration",
            ),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => (
                ErrorKind::ConnectionFailed,
                "Data source connection failed",
            ),
            sqlx::Error::RowNotFound
            | sqlx::Error::TypeNotFound { .. }
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_) => (ErrorKind::InvalidData, "Unexpected query result"),
            sqlx::Error::Protocol(_) => (ErrorKind::QueryFailed, "Data source protocol error"),
            _ => (ErrorKind::Unknown, "Data source error"),
        };

        ScalingError::from((kind, description, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling_error;

    #[test]
    fn check_failures_are_validation_failures() {
        for kind in [
            ErrorKind::DataSourceUnreachable,
            ErrorKind::InsufficientPrivilege,
            ErrorKind::IncompatibleConfiguration,
            ErrorKind::MissingTargetTable,
            ErrorKind::MissingTargetColumn,
        ] {
            assert_eq!(kind.category(), FailureCategory::Validation, "{kind:?}");
        }
    }

    #[test]
    fn lower_level_failures_are_data_access_failures() {
        for kind in [
            ErrorKind::ConnectionFailed,
            ErrorKind::QueryFailed,
            ErrorKind::PositionCaptureFailed,
            ErrorKind::InvalidData,
        ] {
            assert_eq!(kind.category(), FailureCategory::DataAccess, "{kind:?}");
        }
    }

    #[test]
    fn display_includes_kind_description_and_detail() {
        let err = scaling_error!(
            ErrorKind::MissingTargetColumn,
            "Target column missing",
            "orders.order_id"
        );

        assert_eq!(
            err.to_string(),
            "MissingTargetColumn: Target column missing -> orders.order_id"
        );
        assert_eq!(err.detail(), Some("orders.order_id"));
    }

    #[test]
    fn with_kind_keeps_original_text_as_detail() {
        let err = scaling_error!(ErrorKind::ConnectionFailed, "Connection refused")
            .with_kind(ErrorKind::DataSourceUnreachable, "Data source unreachable");

        assert_eq!(err.kind(), ErrorKind::DataSourceUnreachable);
        assert_eq!(err.category(), FailureCategory::Validation);
        assert_eq!(
            err.detail(),
            Some("ConnectionFailed: Connection refused")
        );
    }

    #[test]
    fn pool_timeouts_map_to_connection_failures() {
        let err = ScalingError::from(sqlx::Error::PoolTimedOut);

        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    }

    #[test]
    fn malformed_json_maps_to_deserialization_error() {
        let err = ScalingError::from(serde_json::from_str::<u64>("{").unwrap_err());

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }
}
