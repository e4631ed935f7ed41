//! Error types for building and submitting status update decks.

use thiserror::Error;

use crate::session::Operation;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while editing, validating, or submitting a form.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a local file.
    #[error("Failed to access file: {0}")]
    IoError(#[from] std::io::Error),

    /// One or more of tag, subtag, and metadata is blank.
    #[error("Please fill in all title fields (tag, subtag, metadata).")]
    TitleIncomplete,

    /// The only row in the table carries no data.
    #[error("Please fill in at least one row of data.")]
    NoRowData,

    /// At least one row fails field validation.
    #[error("Please fix validation errors before generating PPTX.")]
    InvalidRows {
        /// Number of rows with at least one field error.
        rows: usize,
    },

    /// The uploaded file does not carry the spreadsheet extension.
    #[error("Please upload a .xlsx file.")]
    InvalidFile(String),

    /// A picked date whose year does not fit `dd/mm/yyyy`.
    #[error("ETA {0} is outside the years 0000 to 9999")]
    EtaOutOfRange(chrono::NaiveDate),

    /// A row index outside the current table.
    #[error("Row {index} does not exist (table has {len} rows)")]
    RowOutOfBounds { index: usize, len: usize },

    /// The same kind of operation is already running.
    #[error("{0} is already in progress")]
    Busy(Operation),

    /// The generation service failed or rejected the request.
    #[error("{0}")]
    Service(String),

    /// The workbook could not be interpreted as a status update sheet.
    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(String),

    /// ZIP archive error (for XLSX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for XLSX).
    #[error("XML parsing error: {0}")]
    XmlError(String),
}

/// Broad classes of failure, in the order a user meets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing title parts, no usable row, or rows with field errors.
    Form,
    /// A file was rejected before any service call.
    File,
    /// The collaborator or local I/O failed.
    Service,
}

impl Error {
    /// Classify this error for reporting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::TitleIncomplete
            | Error::NoRowData
            | Error::InvalidRows { .. }
            | Error::RowOutOfBounds { .. }
            | Error::EtaOutOfRange(_) => ErrorCategory::Form,
            Error::InvalidFile(_) => ErrorCategory::File,
            Error::IoError(_)
            | Error::Busy(_)
            | Error::Service(_)
            | Error::SpreadsheetError(_)
            | Error::ZipError(_)
            | Error::XmlError(_) => ErrorCategory::Service,
        }
    }
}
