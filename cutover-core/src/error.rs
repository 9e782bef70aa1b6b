//! Error types for migration and cutover operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Document not found: {path}")]
    NotFound { path: String },

    #[error("Batch commit failed after {committed_batches} committed batches: {reason}")]
    CommitFailed {
        committed_batches: usize,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Serialization failed for {path}: {reason}")]
    Serialization { path: String, reason: String },

    #[error("Backend error: {reason}")]
    Backend { reason: String },
}

/// Validation errors raised before any I/O happens.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidPathSegment {
        kind: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid idempotency key: {reason}")]
    InvalidIdempotencyKey { reason: String },

    #[error("Refusing to delete legacy docs without --force. Use --archive-only or --force.")]
    UnsafeRetirement,

    #[error("Invalid option {option}: {reason}")]
    InvalidOption { option: String, reason: String },
}

/// Configuration errors. Always fatal, always raised before store access.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Master error type for all cutover errors.
#[derive(Debug, Clone, Error)]
pub enum CutoverError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CutoverError {
    /// Whether this error was raised by configuration loading.
    pub fn is_fatal_config(&self) -> bool {
        matches!(self, CutoverError::Config(_))
    }
}

/// Result type alias for cutover operations.
pub type CutoverResult<T> = Result<T, CutoverError>;

// =============================================================================
// TESTS
// =============================================================================
