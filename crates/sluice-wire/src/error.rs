use thiserror::Error;

/// Errors returned by wire codec operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization/deserialization failure.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// Envelope-level validation failure.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(&'static str),
}
