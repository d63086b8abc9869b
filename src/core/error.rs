//! Error types for chainlift
//!
//! Defines all error types used throughout the library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for reading and projecting chain files
///
/// Every variant aborts the operation that produced it. Per-record parse
/// problems are reported through [`RecordParseError`](crate::core::RecordParseError) instead and never
/// reach this type from the reader.
#[derive(Debug, Error)]
pub enum ChainError {
    /// File could not be opened, read or decompressed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A batch handed to the record parser exceeded its hard capacity
    #[error("Batch of {size} chunks exceeds parser capacity of {capacity}")]
    Capacity { size: usize, capacity: usize },

    /// Rejected configuration value
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker pool could not be created
    #[error("Failed to create thread pool: {0}")]
    ThreadPool(String),
}

impl ChainError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised at the configuration boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Requested more workers than the machine has cores
    #[error("max_workers ({requested}) cannot exceed available cores ({available})")]
    MaxWorkersExceedsCores { requested: usize, available: usize },

    /// Batch size outside `1..capacity`
    #[error("Batch size {size} must be between 1 and {}", .capacity - 1)]
    InvalidBatchSize { size: usize, capacity: usize },

    /// Unknown log level string
    #[error("Invalid log level: {0}. Must be one of debug, info, warning, error, critical")]
    InvalidLogLevel(String),
}

/// Result type alias for chainlift operations
pub type Result<T> = std::result::Result<T, ChainError>;
