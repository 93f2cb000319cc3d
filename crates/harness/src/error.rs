//! Harness error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Codec error: {0}")]
    Codec(#[from] fxpack_fixed_point::CodecError),

    #[error("Config error: {0}")]
    Config(#[from] fxpack_config::ConfigError),

    #[error("File error: {0}")]
    Fio(#[from] fxpack_fio::FioError),

    #[error("Verification failed: {message}")]
    VerificationFailed { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
