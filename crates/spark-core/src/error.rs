use thiserror::Error;

#[derive(Debug, Error)]
pub enum SparkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SparkError {
    /// Short error code string, stable across releases for log scraping.
    pub fn code(&self) -> &'static str {
        match self {
            SparkError::Config(_) => "CONFIG_ERROR",
            SparkError::Serialization(_) => "SERIALIZATION_ERROR",
            SparkError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SparkError>;
