//! Application error types with proper error chaining.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query execution failed: {0}")]
    Query(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),
    #[error("Migration failed: {0}")]
    Migration(String),
}

impl DatabaseError {
    /// True when the store itself could not be reached, as opposed to a
    /// query that ran and failed.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::PoolExhausted(_))
    }
}

/// Failures of the bearer-token check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),
    #[error("Credential expired")]
    Expired,
}

/// Failures reported by the blob-storage collaborator.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Validation failed: {0}")]
    Multiple(String),
}

impl From<&str> for ValidationError {
    fn from(s: &str) -> Self {
        ValidationError::InvalidFormat(s.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Email has been registered")]
    DuplicateEmail,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(ValidationError::Multiple(err.to_string()))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted("Pool timed out".to_string()),
            sqlx::Error::Io(io_err) => DatabaseError::Connection(io_err.to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.code().is_some_and(|code| code == "23505") {
                    return DatabaseError::Duplicate(db_err.message().to_string());
                }
                DatabaseError::Query(db_err.message().to_string())
            }
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(DatabaseError::from(err))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(DatabaseError::Migration(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_conversions() {
        let not_found = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(matches!(not_found, DatabaseError::NotFound(_)));

        let pool_timeout = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(pool_timeout, DatabaseError::PoolExhausted(_)));
        assert!(pool_timeout.is_unavailable());

        let generic = DatabaseError::from(sqlx::Error::WorkerCrashed);
        assert!(matches!(generic, DatabaseError::Query(_)));
        assert!(!generic.is_unavailable());
    }

    #[test]
    fn test_validation_conversion() {
        use validator::Validate;

        #[derive(Validate)]
        struct TestStruct {
            #[validate(length(min = 1))]
            val: String,
        }

        let s = TestStruct {
            val: "".to_string(),
        };
        let err = s.validate().unwrap_err();
        let app_err = AppError::from(err);

        assert!(matches!(
            app_err,
            AppError::Validation(ValidationError::Multiple(_))
        ));
    }

    #[test]
    fn test_validation_error_from_str() {
        let err: ValidationError = "invalid format".into();
        assert!(matches!(err, ValidationError::InvalidFormat(msg) if msg == "invalid format"));
    }

    #[test]
    fn test_token_error_display() {
        let err = TokenError::InvalidCredential("bad signature".to_string());
        assert_eq!(err.to_string(), "Invalid credential: bad signature");

        assert_eq!(TokenError::Expired.to_string(), "Credential expired");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::WriteFailed("disk full".to_string());
        assert_eq!(err.to_string(), "Write failed: disk full");

        let err = StorageError::InvalidUpload("text/plain".to_string());
        assert_eq!(err.to_string(), "Invalid upload: text/plain");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnvVar("DATABASE_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Missing environment variable: DATABASE_URL"
        );

        let err = ConfigError::InvalidValue {
            key: "JWT_SECRET".to_string(),
            message: "too short".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for 'JWT_SECRET': too short");
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Campaign 7".to_string());
        assert_eq!(err.to_string(), "Campaign 7 not found");

        let err = AppError::Forbidden("not the campaign owner".to_string());
        assert_eq!(err.to_string(), "Forbidden: not the campaign owner");

        assert_eq!(
            AppError::DuplicateEmail.to_string(),
            "Email has been registered"
        );
        assert_eq!(
            AppError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
    }

    #[test]
    fn test_app_error_from_token_error() {
        let app_err: AppError = TokenError::Expired.into();
        assert!(matches!(app_err, AppError::Token(TokenError::Expired)));
    }

    #[test]
    fn test_app_error_from_migrate_error() {
        let mig_err = sqlx::migrate::MigrateError::VersionMissing(1);
        let app_err: AppError = mig_err.into();

        match app_err {
            AppError::Database(DatabaseError::Migration(msg)) => {
                assert!(msg.contains("migration 1 was previously applied"));
            }
            _ => panic!("Expected DatabaseError::Migration, got {:?}", app_err),
        }
    }
}
