//! Typed errors for the statistics and rendering pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::model::OutputFormat;

#[derive(Debug, Error)]
pub enum LqError {
    /// Bad option values: unsupported format, quantile outside [0, 1],
    /// a column index the input does not have, zero bins.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not enough measurements to compute what was asked for.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A field of the input table could not be read as a number.
    #[error("parse error at line {line}, column {column}: {msg}")]
    Parse {
        line: usize,
        column: usize,
        msg: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SVG could not be converted into the requested image format.
    #[error("render error: {0}")]
    Render(String),

    /// One or more figure files failed to save. Every format was attempted.
    #[error("failed to save {} figure file(s): {}", failures.len(), describe_failures(failures))]
    Export { failures: Vec<ExportFailure> },

    #[error("failed to build svg: {0}")]
    Fmt(#[from] std::fmt::Error),
}

#[derive(Debug)]
pub struct ExportFailure {
    pub format: OutputFormat,
    pub path: PathBuf,
    pub reason: String,
}

fn describe_failures(failures: &[ExportFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({}): {}", f.path.display(), f.format, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl LqError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LqError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LqError>;
