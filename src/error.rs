//! Error types for the record pipeline

use chrono::NaiveDate;
use thiserror::Error;

/// Why a single CSV row did not become a `CourseRecord`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid date in {field}: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid grade: {0:?}")]
    InvalidGrade(String),

    #[error("completion date required for status {status}")]
    MissingCompletionDate { status: String },

    /// Completion date falls outside the course window. The row is
    /// dropped without counting as malformed.
    #[error("completion date {completion} outside course window {start}..={end}")]
    OutOfRange {
        completion: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl RowError {
    pub fn is_discard(&self) -> bool {
        matches!(self, RowError::OutOfRange { .. })
    }
}

/// Failure that routes a whole input file to the error folder.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing column in header: {0}")]
    MissingColumn(String),

    #[error("CSV file is empty or only contains header")]
    EmptyFile,
}

/// Rejections from the submit path into the input folder.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Uploaded file is empty.")]
    Empty,

    #[error("Only CSV files (.csv) are allowed: {0}")]
    NotCsv(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("Failed to save the uploaded file: {0}")]
    Io(#[from] std::io::Error),
}
