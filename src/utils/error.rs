use thiserror::Error;

#[derive(Error, Debug)]
pub enum DraftStoreError {
    #[error("Draft storage unavailable at {path}: {reason}")]
    StorageUnavailable { path: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to read file '{name}': {source}")]
    FileRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File '{name}' is {size} bytes, limit is {limit}")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Storage,
    Input,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DraftStoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DraftStoreError::StorageUnavailable { .. } | DraftStoreError::Database(_) => {
                ErrorCategory::Storage
            }
            DraftStoreError::FileRead { .. } | DraftStoreError::FileTooLarge { .. } => {
                ErrorCategory::Input
            }
            DraftStoreError::ConfigError { .. }
            | DraftStoreError::ConfigValidationError { .. }
            | DraftStoreError::InvalidConfigValueError { .. }
            | DraftStoreError::MissingConfigError { .. } => ErrorCategory::Configuration,
            DraftStoreError::IoError(_)
            | DraftStoreError::TaskJoin(_)
            | DraftStoreError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // A busy or locked database usually clears on its own.
            DraftStoreError::Database(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                ErrorSeverity::Medium
            }
            DraftStoreError::Database(_) => ErrorSeverity::High,
            DraftStoreError::FileRead { .. } | DraftStoreError::FileTooLarge { .. } => {
                ErrorSeverity::High
            }
            DraftStoreError::ConfigError { .. }
            | DraftStoreError::ConfigValidationError { .. }
            | DraftStoreError::InvalidConfigValueError { .. }
            | DraftStoreError::MissingConfigError { .. } => ErrorSeverity::High,
            DraftStoreError::StorageUnavailable { .. }
            | DraftStoreError::IoError(_)
            | DraftStoreError::TaskJoin(_)
            | DraftStoreError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            DraftStoreError::StorageUnavailable { path, .. } => format!(
                "Check that {} is writable and has free space, or run with --memory (attachments will not survive a restart)",
                path
            ),
            DraftStoreError::Database(_) => {
                "Retry the operation; if it keeps failing, re-save the field to confirm its final state".to_string()
            }
            DraftStoreError::FileRead { name, .. } => {
                format!("Make sure '{}' exists and is readable", name)
            }
            DraftStoreError::FileTooLarge { limit, .. } => format!(
                "Use a file smaller than {} bytes or raise store.max_file_bytes",
                limit
            ),
            DraftStoreError::ConfigError { .. }
            | DraftStoreError::ConfigValidationError { .. }
            | DraftStoreError::InvalidConfigValueError { .. }
            | DraftStoreError::MissingConfigError { .. } => {
                "Review the configuration file and command line flags".to_string()
            }
            DraftStoreError::IoError(_) => "Check file permissions and disk space".to_string(),
            DraftStoreError::TaskJoin(_) => "Retry the operation".to_string(),
            DraftStoreError::SerializationError(_) => "Report this as a bug".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Storage => format!("Draft storage failed: {}", self),
            ErrorCategory::Input => format!("Could not store file: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, DraftStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_categorized() {
        let err = DraftStoreError::StorageUnavailable {
            path: "/nope/drafts.db".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.recovery_suggestion().contains("/nope/drafts.db"));
        assert!(err.user_friendly_message().starts_with("Draft storage failed"));
    }

    #[test]
    fn test_busy_database_is_retryable() {
        let err = DraftStoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_file_errors_are_input() {
        let err = DraftStoreError::FileTooLarge {
            name: "house.jpg".to_string(),
            size: 20,
            limit: 10,
        };
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.to_string(), "File 'house.jpg' is 20 bytes, limit is 10");
    }
}
