//! Error types for nagwatch

use thiserror::Error;

/// Errors that can occur while driving a nag session
#[derive(Debug, Error)]
pub enum NagError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid KPI threshold: {0} minutes (must be a positive integer)")]
    InvalidThreshold(u32),

    #[error("Landmark capture is unavailable for this session")]
    CaptureUnavailable,

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
