//! Error types for Synheart Cohort

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error(
        "Insufficient features for clustering: {available} usable, at least {required} required"
    )]
    InsufficientFeatures { available: usize, required: usize },

    #[error("Invalid cluster count: {requested} requested for {users} distinct users (must be 1..={users})")]
    InvalidClusterCount { requested: usize, users: usize },

    #[error("Dimension mismatch: expected {expected} columns, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
