//! Configuration resolution error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot parse formula {formula:?}: {message}")]
    Parse { formula: String, message: String },

    #[error("Cyclic dependency: {path}")]
    CyclicDependency { path: String },

    #[error("Unknown key {name:?} referenced from section {section:?}")]
    UnknownKey { name: String, section: String },

    #[error("Ambiguous reference {name:?}: defined in sections {sections}")]
    AmbiguousReference { name: String, sections: String },

    #[error("Type mismatch in {context}: expected {expected}, got {got}")]
    TypeMismatch {
        context: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Integer overflow in {0}")]
    Overflow(String),

    #[error("Invalid entry {key}: {reason}")]
    InvalidEntry { key: String, reason: String },

    #[error("Formula for {key} failed: {source}")]
    Formula {
        key: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("Missing configuration key: {0}")]
    Missing(String),

    #[error("Unknown size variant: {0}")]
    UnknownVariant(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
