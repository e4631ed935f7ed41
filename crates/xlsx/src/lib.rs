//! XLSX (Office Open XML) reader for status update workbooks.
//!
//! Parses .xlsx files, which are ZIP archives containing XML documents, and
//! maps template-shaped sheets onto status update rows.

pub mod parser;
pub mod status;

pub use parser::{CellValue, Sheet, XlsxReader};
pub use status::{SheetRow, StatusSheet};

use status_core::Result;
use std::io::{Read, Seek};

/// Read the status update rows from a workbook.
pub fn read_status_sheet<R: Read + Seek>(reader: R) -> Result<StatusSheet> {
    let sheet = XlsxReader::new().read(reader)?;
    StatusSheet::from_sheet(&sheet)
}
