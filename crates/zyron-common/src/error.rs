//! Error types for ZyronDB index crates.

use thiserror::Error;

/// Result type alias using ZyronError.
pub type Result<T> = std::result::Result<T, ZyronError>;

/// Errors that can occur in ZyronDB index operations.
#[derive(Debug, Error)]
pub enum ZyronError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Encoding errors
    #[error("Key corrupted: {reason}")]
    KeyCorrupted { reason: String },

    #[error("Block corrupted at offset {offset}: {reason}")]
    BlockCorrupted { offset: u64, reason: String },

    #[error("Update log corrupted: {reason}")]
    UpdateLogCorrupted { reason: String },

    #[error("Index header corrupted: {reason}")]
    HeaderCorrupted { reason: String },

    #[error("Key too large: {size} bytes (max {max})")]
    KeyTooLarge { size: usize, max: usize },

    // Type errors
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    // Index state errors
    #[error("Invalid index state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Index population failed: {0}")]
    IndexFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Index entry conflict: entities {existing} and {added} share value {value}")]
    IndexEntryConflict {
        existing: i64,
        added: i64,
        value: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}
