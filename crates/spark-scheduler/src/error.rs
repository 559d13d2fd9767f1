use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error raised while a cycle talks to the store.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store named by the configuration could not be opened.
    #[error("Store {target} unavailable: {reason}")]
    StoreUnavailable { target: String, reason: String },

    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] spark_core::SparkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) => "DATABASE_ERROR",
            SchedulerError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            SchedulerError::Config(e) => e.code(),
            SchedulerError::Io(_) => "IO_ERROR",
        }
    }

    /// Store communication failures leave the cycle's transaction in an
    /// unknown state; the loop must stop rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::Database(_) | SchedulerError::StoreUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
