//! Tool error types.

/// Result type alias for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors that can occur while executing a shop tool.
///
/// The executor absorbs these into error tool replies; they never abort a
/// turn on their own.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The arguments object was missing a field or carried a wrong type.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Error description.
        message: String,
    },

    /// SQLite operation failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool exhausted or unavailable.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Result serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tool-specific failure.
    #[error("{message}")]
    Execution {
        /// Error description.
        message: String,
    },
}

impl ToolError {
    /// Shorthand for an invalid-arguments error.
    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }
}
