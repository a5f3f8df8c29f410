//! # Error Handling
//!
//! Error types for PivotDB operations.
//!
//! ## Taxonomy
//!
//! 1. **Configuration**: invalid settings, rejected at construction
//! 2. **State**: lifecycle violations (query before freeze, freeze twice)
//! 3. **Data**: distances outside the declared bounds
//! 4. **Clustering**: space-tree training could not bisect a subspace
//! 5. **Storage**: failures surfaced by the backing stores, passed through

use thiserror::Error;

use crate::types::ObjectId;

/// Result type alias for PivotDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for PivotDB
#[derive(Error, Debug)]
pub enum Error {
    // Configuration Errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // State Errors
    #[error("Index is not frozen; queries require a completed freeze")]
    NotFrozen,

    #[error("Index is already frozen")]
    AlreadyFrozen,

    #[error("Freeze in progress")]
    FreezeInProgress,

    #[error("Pivots unavailable: requested {requested}, available {available}")]
    PivotsUnavailable { requested: usize, available: usize },

    // Data Errors
    #[error("Distance {value} to pivot {pivot} outside declared bounds [{min}, {max}]")]
    OutOfRange { pivot: usize, value: f64, min: f64, max: f64 },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Object {id} not found")]
    ObjectNotFound { id: ObjectId },

    // Training Errors
    #[error("Clustering failed after {attempts} attempts on {points} points")]
    ClusteringFailed { attempts: usize, points: usize },

    // Storage Errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Codec error: {message}")]
    Codec { message: String },

    #[error("IO error: {message}")]
    Io { message: String, source: std::io::Error },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Check if error is recoverable by retrying the same call later
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::FreezeInProgress => true,
            Error::Storage { .. } => true,
            Error::Io { .. } => true,
            Error::Configuration { .. } => false,
            Error::NotFrozen | Error::AlreadyFrozen => false,
            Error::PivotsUnavailable { .. } => false,
            Error::OutOfRange { .. } => false,
            Error::ClusteringFailed { .. } => false,
            Error::InvalidQuery { .. } => false,
            Error::ObjectNotFound { .. } => false,
            Error::Codec { .. } => false,
            Error::Internal { .. } => false,
        }
    }

    /// Get error code for monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Configuration { .. } => "CONFIG_ERROR",
            Error::NotFrozen => "NOT_FROZEN",
            Error::AlreadyFrozen => "ALREADY_FROZEN",
            Error::FreezeInProgress => "FREEZE_IN_PROGRESS",
            Error::PivotsUnavailable { .. } => "PIVOTS_UNAVAILABLE",
            Error::OutOfRange { .. } => "OUT_OF_RANGE",
            Error::InvalidQuery { .. } => "INVALID_QUERY",
            Error::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            Error::ClusteringFailed { .. } => "CLUSTERING_FAILED",
            Error::Storage { .. } => "STORAGE_ERROR",
            Error::Codec { .. } => "CODEC_ERROR",
            Error::Io { .. } => "IO_ERROR",
            Error::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn codec(message: impl Into<String>) -> Self {
        Error::Codec { message: message.into() }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration { message: message.into() }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Extension trait for adding context to results
pub trait ResultExt<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e {
            Error::Storage { message } => Error::Storage {
                message: format!("{}: {}", f(), message),
            },
            Error::Codec { message } => Error::Codec {
                message: format!("{}: {}", f(), message),
            },
            other => other,
        })
    }
}
