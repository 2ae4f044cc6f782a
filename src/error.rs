use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromcronError {
    #[error("parse error {source_name}:{line} {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("error reading {path}: {source}")]
    TableRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PromcronError>;

/// Errors produced while compiling a single time-field expression.
///
/// These surface to the operator wrapped in [`PromcronError::Parse`] with the
/// field's semantic name and the table line, so each message names the
/// offending sub-expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("failed to parse int from {0}")]
    BadInt(String),

    #[error("negative number ({num}) not allowed: {expr}")]
    Negative { num: i64, expr: String },

    #[error("too many hyphens: {0}")]
    TooManyHyphens(String),

    #[error("too many slashes: {0}")]
    TooManySlashes(String),

    #[error("beginning of range ({start}) below minimum ({min}): {expr}")]
    BelowMinimum { start: u32, min: u32, expr: String },

    #[error("end of range ({end}) above maximum ({max}): {expr}")]
    AboveMaximum { end: u32, max: u32, expr: String },

    #[error("beginning of range ({start}) beyond end of range ({end}): {expr}")]
    InvertedRange { start: u32, end: u32, expr: String },

    #[error("step of range should be a positive number: {0}")]
    ZeroStep(String),
}
