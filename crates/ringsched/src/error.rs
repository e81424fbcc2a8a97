use thiserror::Error;

/// Errors shared across the ring buffer, scheduler, and pub/sub bus.
///
/// Mirrors the four error kinds the source reports as bare return codes:
/// invalid input, a full table, an unknown topic, and a detected invariant
/// violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RtError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("resource exhausted: {what}")]
    ResourceExhausted { what: &'static str },

    #[error("topic not found: {topic}")]
    NotFound { topic: String },

    #[error("invariant violation: {detail}")]
    InvariantViolation { detail: String },
}

pub type Result<T> = std::result::Result<T, RtError>;
