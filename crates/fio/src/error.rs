//! File I/O error types

use thiserror::Error;

use fxpack_fixed_point::CodecError;

#[derive(Error, Debug)]
pub enum FioError {
    #[error("Malformed byte token at index {index}: {source}")]
    MalformedToken {
        index: usize,
        #[source]
        source: CodecError,
    },

    #[error("Invalid dictionary entry {key:?}: {reason}")]
    InvalidDict { key: String, reason: String },

    #[error("Invalid tensor dtype for {name}: expected f64 or f32, got {got}")]
    InvalidDtype { name: String, got: String },

    #[error("Unknown dictionary format: {0}")]
    UnknownFormat(String),

    #[error("Safetensors error: {0}")]
    Safetensors(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FioError>;
