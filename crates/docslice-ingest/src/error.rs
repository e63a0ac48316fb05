//! Error types for the parsing pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur while parsing and chunking a document.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] docslice_config::ConfigError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Parse error for {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid title pattern {pattern:?}: {message}")]
    InvalidTitlePattern { pattern: String, message: String },

    #[error("Image extraction failed for {image}: {message}")]
    ImageExtraction { image: String, message: String },
}

impl IngestError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        IngestError::ParseError {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
