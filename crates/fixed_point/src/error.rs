//! Codec error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed token {token:?}: {reason}")]
    MalformedToken { token: String, reason: String },

    #[error("Width mismatch at element {index}: expected {expected} bits, got {got}")]
    WidthMismatch {
        expected: usize,
        got: usize,
        index: usize,
    },

    #[error("Invalid bit width: {0} (must be 1-{max})", max = crate::MAX_BIT_WIDTH)]
    InvalidBitWidth(u32),

    #[error("Invalid {what}: must be positive")]
    ZeroSize { what: &'static str },

    #[error("Target count {target} is below current length {current}")]
    TargetCountTooSmall { current: usize, target: usize },

    #[error("Target width {target} is below current width {current}")]
    TargetWidthTooSmall { current: usize, target: usize },

    #[error("Cannot pad an empty list: element width unknown")]
    EmptyList,
}

pub type Result<T> = std::result::Result<T, CodecError>;
