use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ProtmapError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("mapping service request failed: {0}")]
    MappingHttp(String),

    #[error("mapping service returned status {status}: {message}")]
    MappingStatus { status: u16, message: String },

    #[error("detail service request failed: {0}")]
    DetailHttp(String),

    #[error("detail service returned status {status}: {message}")]
    DetailStatus { status: u16, message: String },

    #[error("catalog index error: {0}")]
    Index(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
