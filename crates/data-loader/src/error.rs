//! Error types for the data-loader crate.
//!
//! Every failure while reading tables, building the rating matrix or
//! persisting it is reported through [`DataLoadError`].

use thiserror::Error;

/// Errors that can occur while loading tables and building rating matrices
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// I/O error occurred while reading or writing a file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The CSV reader or writer failed
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Line in a data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Expected number of fields in a row doesn't match actual
    #[error("Expected {expected} fields but found {found} in line {line}")]
    FieldCountMismatch {
        expected: usize,
        found: usize,
        line: usize,
    },

    /// A named column does not exist in any of the tables involved
    #[error("Column '{column}' not found")]
    MissingColumn { column: String },

    /// A non-key column exists in both joined tables, so a lookup by name is ambiguous
    #[error("Column '{column}' is present in both tables")]
    AmbiguousColumn { column: String },

    /// The inner join on the key column matched no rows
    #[error("Join on '{key}' produced no rows")]
    JoinProducedEmptyResult { key: String },

    /// The join matched rows but none of them carried a rating
    #[error("No observed ratings after pivoting")]
    EmptyMatrix,

    /// An item column has no observed rating, so its mean is undefined
    #[error("Item column '{item}' has no observed ratings")]
    EmptyColumn { item: String },

    /// Matrix dimensions do not agree with the labels supplied for them
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
