//! Checkpoint store error types.

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the checkpoint store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool exhausted or unavailable.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// State (de)serialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration failed.
    #[error("migration {version} failed: {message}")]
    Migration {
        /// Migration version.
        version: u32,
        /// Error description.
        message: String,
    },

    /// No thread with the given ID.
    #[error("thread not found: {thread_id}")]
    ThreadNotFound {
        /// The missing thread.
        thread_id: String,
    },

    /// A turn is already in flight on this thread.
    #[error("thread busy: {thread_id}")]
    ThreadBusy {
        /// The locked thread.
        thread_id: String,
    },

    /// A snapshot was written by a newer schema than this build supports.
    #[error("checkpoint schema version {found} is newer than supported version {supported}")]
    SchemaVersionAhead {
        /// Version found in the row.
        found: u32,
        /// Highest version this build understands.
        supported: u32,
    },
}
