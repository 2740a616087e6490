//! Separation error types

use std::path::PathBuf;
use thiserror::Error;

use crate::convert::ConvertError;

/// Errors that can occur while splitting a file into stems
#[derive(Error, Debug)]
pub enum SeparationError {
    #[error("Failed to start {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed (exit code {code:?}):\n{stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Separation finished but {dir:?} is missing {missing:?}")]
    MissingStems { dir: PathBuf, missing: Vec<String> },

    #[error("Failed to prepare input: {0}")]
    Conversion(#[from] ConvertError),

    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("Separation cancelled")]
    Cancelled,

    #[error("Separation service is not running")]
    ServiceStopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SeparationError>;
