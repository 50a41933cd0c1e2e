//! Error types for LinHash.

use thiserror::Error;

/// Result type alias using LinHashError.
pub type Result<T> = std::result::Result<T, LinHashError>;

/// Errors that can occur in LinHash operations.
#[derive(Debug, Error)]
pub enum LinHashError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Construction and parse errors
    #[error("Malformed choice vector: {0}")]
    MalformedDescriptor(String),

    #[error("Malformed tuple: expected {expected} fields, got {actual}")]
    MalformedTuple { expected: usize, actual: usize },

    #[error("Invalid tuple: {0}")]
    InvalidTuple(String),

    #[error("Invalid query arity: expected {expected} fields, got {actual}")]
    InvalidQueryArity { expected: usize, actual: usize },

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    #[error("Input line {line}: {source}")]
    InputLine {
        line: usize,
        #[source]
        source: Box<LinHashError>,
    },

    // Storage errors
    #[error("Page full, unable to insert tuple")]
    PageFull,

    #[error("Storage write failed: {0}")]
    StorageWriteFailure(String),

    #[error("Storage corrupted: {0}")]
    StorageCorrupted(String),

    // Relation errors
    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    #[error("Relation already exists: {0}")]
    RelationExists(String),

    #[error("Relation opened read-only: {0}")]
    ReadOnly(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}

impl LinHashError {
    /// Returns true for errors that mean the on-disk relation can no longer
    /// be trusted. Callers must stop using the relation after one of these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LinHashError::StorageCorrupted(_) | LinHashError::StorageWriteFailure(_)
        )
    }
}
