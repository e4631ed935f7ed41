//! Core domain types, row validation, and the form controller for
//! project status update decks.

pub mod error;
pub mod eta;
pub mod form;
pub mod normalize;
pub mod notify;
pub mod session;
pub mod types;
pub mod validation;

pub use error::{Error, ErrorCategory, Result};
pub use eta::{decode_eta, display_eta, encode_eta, is_encodable};
pub use form::StatusForm;
pub use normalize::CellNormalizer;
pub use notify::{Notification, Severity};
pub use session::{
    DirectorySink, GenerationService, Operation, PayloadSink, Saved, Session, PRESENTATION_FILE_NAME,
    SPREADSHEET_EXTENSION, TEMPLATE_FILE_NAME,
};
pub use types::{
    ProjectUpdateRequest, Row, RowField, EFFORT_OPTIONS, FIXED_COLUMNS, STATUS_OPTIONS, SUBTAG_OPTIONS, TAG_OPTIONS,
};
pub use validation::{has_validation_errors, off_list_fields, validate_all_rows, validate_row, RowErrors};
