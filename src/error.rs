//! Error types for the sales ETL job.

use thiserror::Error;

/// The main error type for ETL operations.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Could not open the database connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single source relation could not be read.
    #[error("Extraction of '{entity}' failed: {message}")]
    Extraction {
        entity: &'static str,
        message: String,
    },

    /// One or more sources were not extracted, so no summary can be built.
    #[error("Transform not computable: missing {}", .missing.join(", "))]
    NotComputable { missing: Vec<&'static str> },

    /// A value in the joined data could not be interpreted.
    #[error("Transform error: {0}")]
    Transform(String),

    /// The destination table could not be created.
    #[error("Failed to create table '{table}': {message}")]
    CreateTable { table: String, message: String },

    /// The batch insert failed and was rolled back.
    #[error("Failed to load rows into '{table}': {message}")]
    Insert { table: String, message: String },

    /// Generic database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    /// Create an extraction error for the given source.
    pub fn extraction(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Extraction {
            entity,
            message: message.into(),
        }
    }

    /// Create a transform error.
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform(message.into())
    }
}

impl From<sqlx::Error> for EtlError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for ETL operations.
pub type EtlResult<T> = Result<T, EtlError>;
