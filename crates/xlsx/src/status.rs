//! Interpretation of a sheet laid out like the status update template.
//!
//! The template carries an optional title above a header row whose first
//! cell reads `Sl no.`; data rows follow. Columns B through G hold brief,
//! impact, effort, remarks, eta, and status.

use chrono::{Days, NaiveDate};
use status_core::{encode_eta, validate_row, CellNormalizer, Error, Result, Row, RowErrors, RowField};

use crate::parser::{CellValue, Sheet};

/// Column holding the serial number; the data fields follow it.
const SERIAL_COLUMN: u32 = 1;

/// Day zero of the 1900 date system as used by Excel and LibreOffice.
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// A data row read from the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based row number in the sheet, for error messages.
    pub line: u32,
    pub row: Row,
}

/// Status update rows read from a template-shaped sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSheet {
    /// Text above the header row, if any.
    pub title: Option<String>,
    pub rows: Vec<SheetRow>,
}

impl StatusSheet {
    /// Read rows from a sheet in template layout.
    pub fn from_sheet(sheet: &Sheet) -> Result<Self> {
        let normalizer = CellNormalizer::new();

        let header_line = sheet
            .rows()
            .find(|(_, cols)| {
                cols.get(&SERIAL_COLUMN)
                    .map(|value| is_serial_header(&cell_text(value, &normalizer)))
                    .unwrap_or(false)
            })
            .map(|(line, _)| line)
            .ok_or_else(|| Error::SpreadsheetError("No header row starting with 'Sl no.' found".to_string()))?;

        let title = sheet
            .rows()
            .take_while(|(line, _)| *line < header_line)
            .flat_map(|(_, cols)| cols.values())
            .map(|value| cell_text(value, &normalizer))
            .find(|text| !text.is_empty());

        let mut rows = Vec::new();
        for (line, cols) in sheet.rows().filter(|(line, _)| *line > header_line) {
            let mut row = Row::new();
            for (offset, field) in RowField::ALL.into_iter().enumerate() {
                let col = SERIAL_COLUMN + 1 + offset as u32;
                if let Some(value) = cols.get(&col) {
                    row.set(field, field_text(field, value, &normalizer));
                }
            }

            if RowField::ALL.iter().all(|&field| row.get(field).is_empty()) {
                log::debug!("Skipping empty sheet row {}", line);
                continue;
            }
            rows.push(SheetRow { line, row });
        }

        log::debug!("Read {} data rows below header row {}", rows.len(), header_line);
        Ok(Self { title, rows })
    }

    /// Rows without their sheet positions.
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows.iter().map(|r| r.row.clone()).collect()
    }

    /// Field errors for rows that fail validation, keyed by sheet row number.
    pub fn invalid_rows(&self) -> Vec<(u32, RowErrors)> {
        self.rows
            .iter()
            .map(|r| (r.line, validate_row(&r.row)))
            .filter(|(_, errors)| !errors.is_empty())
            .collect()
    }
}

/// Header cells may carry a bound suffix such as "Brief about change (96)".
fn is_serial_header(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.starts_with("sl no") || lowered.starts_with("sl. no")
}

/// Render a cell for a given field.
fn field_text(field: RowField, value: &CellValue, normalizer: &CellNormalizer) -> String {
    match (field, value) {
        (RowField::Eta, CellValue::Number(serial)) => match excel_serial_to_date(*serial) {
            Some(date) => encode_eta(date),
            None => format_number(*serial),
        },
        _ => cell_text(value, normalizer),
    }
}

/// Render a cell as plain text.
fn cell_text(value: &CellValue, normalizer: &CellNormalizer) -> String {
    match value {
        CellValue::Text(text) => normalizer.normalize(text),
        CellValue::Number(number) => format_number(*number),
        CellValue::Bool(true) => "TRUE".to_string(),
        CellValue::Bool(false) => "FALSE".to_string(),
    }
}

/// Whole numbers print without a fractional part.
fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Convert a date serial to a calendar date, dropping any time of day.
///
/// Serials before 1 March 1900 are off by one because of the phantom
/// 29 February 1900; the template never holds such dates.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(serial.floor() as u64))
}
