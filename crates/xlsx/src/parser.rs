//! XLSX workbook reader.
//!
//! Reads the first worksheet of a workbook into a sparse grid of cell
//! values. Styles, formulas, and every sheet after the first are ignored.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use status_core::{Error, Result};
use std::collections::BTreeMap;
use std::io::{Read, Seek};
use zip::result::ZipError;
use zip::ZipArchive;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
const DEFAULT_SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

/// Sheet size limits of the file format (rows 1..=1048576, columns A..=XFD).
const MAX_ROWS: u32 = 1_048_576;
const MAX_COLUMNS: u32 = 16_384;

/// A single cell value as stored in the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

/// Cells of the first worksheet, keyed by 1-based row then column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    /// Sheet name from the workbook, when known.
    pub name: Option<String>,
    cells: BTreeMap<u32, BTreeMap<u32, CellValue>>,
}

impl Sheet {
    /// Look up a cell by 1-based row and column.
    pub fn cell(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cells.get(&row).and_then(|cols| cols.get(&col))
    }

    /// Non-empty rows in order, with their 1-based row numbers.
    pub fn rows(&self) -> impl Iterator<Item = (u32, &BTreeMap<u32, CellValue>)> {
        self.cells.iter().map(|(row, cols)| (*row, cols))
    }

    /// Number of rows holding at least one cell.
    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    fn insert(&mut self, row: u32, col: u32, value: CellValue) {
        self.cells.entry(row).or_default().insert(col, value);
    }
}

/// Parser for XLSX (Office Open XML) workbooks.
pub struct XlsxReader;

impl XlsxReader {
    /// Create a new XLSX reader.
    pub fn new() -> Self {
        Self
    }

    /// Read the first worksheet of a workbook.
    pub fn read<R: Read + Seek>(&self, reader: R) -> Result<Sheet> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let (name, sheet_path) = self.first_sheet(&mut archive)?;
        let shared = self.read_shared_strings(&mut archive)?;
        log::debug!(
            "Reading sheet {:?} from {} ({} shared strings)",
            name,
            sheet_path,
            shared.len()
        );

        let content = self.read_file_from_archive(&mut archive, &sheet_path)?;
        let mut sheet = self.parse_sheet(&content, &shared)?;
        sheet.name = name;
        Ok(sheet)
    }

    /// Resolve the name and archive path of the first worksheet.
    fn first_sheet<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<(Option<String>, String)> {
        let workbook = self.read_file_from_archive(archive, WORKBOOK_PATH)?;

        let mut first: Option<(String, String)> = None;
        let mut reader = Reader::from_str(&workbook);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"sheet" => {
                    let name = attribute(e, b"name").unwrap_or_default();
                    let rel_id = attribute(e, b"id").unwrap_or_default();
                    first = Some((name, rel_id));
                    break;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!("Error parsing workbook: {}", e)));
                }
                _ => {}
            }
        }

        let Some((name, rel_id)) = first else {
            return Err(Error::SpreadsheetError("Workbook has no sheets".to_string()));
        };

        let path = match self.read_optional_file(archive, WORKBOOK_RELS_PATH)? {
            Some(rels) => find_relationship_target(&rels, &rel_id)?,
            None => None,
        };

        let path = path.unwrap_or_else(|| {
            log::warn!("No relationship for sheet {:?}; assuming {}", name, DEFAULT_SHEET_PATH);
            DEFAULT_SHEET_PATH.to_string()
        });

        Ok((Some(name).filter(|n| !n.is_empty()), path))
    }

    /// Read the shared string table. Workbooks without one have no text cells
    /// stored by index.
    fn read_shared_strings<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let Some(content) = self.read_optional_file(archive, SHARED_STRINGS_PATH)? else {
            return Ok(Vec::new());
        };

        let mut strings = Vec::new();
        let mut reader = Reader::from_str(&content);

        let mut current = String::new();
        let mut in_item = false;
        let mut in_text = false;
        let mut in_phonetic = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let name = e.name();
                    match local_name(name.as_ref()) {
                        b"si" => {
                            in_item = true;
                            current.clear();
                        }
                        b"t" => in_text = true,
                        b"rPh" => in_phonetic = true,
                        _ => {}
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    if local_name(e.name().as_ref()) == b"si" {
                        strings.push(String::new());
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if in_item && in_text && !in_phonetic {
                        let text = e.unescape().unwrap_or_default();
                        current.push_str(&text);
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = e.name();
                    match local_name(name.as_ref()) {
                        b"si" => {
                            strings.push(std::mem::take(&mut current));
                            in_item = false;
                        }
                        b"t" => in_text = false,
                        b"rPh" => in_phonetic = false,
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing shared strings: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(strings)
    }

    /// Parse worksheet XML into a grid.
    fn parse_sheet(&self, xml_content: &str, shared: &[String]) -> Result<Sheet> {
        let mut sheet = Sheet::default();
        let mut reader = Reader::from_str(xml_content);

        let mut current_row: u32 = 0;
        let mut next_col: u32 = 1;
        let mut current_cell: Option<PendingCell> = None;
        let mut in_value = false;
        let mut in_inline = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let name = e.name();
                    match local_name(name.as_ref()) {
                        b"row" => {
                            current_row = row_number(e, current_row)?;
                            next_col = 1;
                        }
                        b"c" => {
                            let cell = PendingCell::start(e, current_row, next_col)?;
                            next_col = cell.col + 1;
                            current_cell = Some(cell);
                        }
                        b"v" => in_value = true,
                        b"is" => in_inline = true,
                        b"t" if in_inline => in_value = true,
                        _ => {}
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    let name = e.name();
                    match local_name(name.as_ref()) {
                        b"c" => {
                            let cell = PendingCell::start(e, current_row, next_col)?;
                            next_col = cell.col + 1;
                        }
                        b"row" => {
                            current_row = row_number(e, current_row)?;
                        }
                        _ => {}
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if in_value {
                        if let Some(cell) = current_cell.as_mut() {
                            let text = e.unescape().unwrap_or_default();
                            cell.raw.push_str(&text);
                        }
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = e.name();
                    match local_name(name.as_ref()) {
                        b"v" | b"t" => in_value = false,
                        b"is" => in_inline = false,
                        b"c" => {
                            if let Some(cell) = current_cell.take() {
                                let (row, col) = (cell.row, cell.col);
                                if let Some(value) = cell.finish(shared) {
                                    sheet.insert(row, col, value);
                                }
                            }
                            in_value = false;
                            in_inline = false;
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!("Error parsing worksheet: {}", e)));
                }
                _ => {}
            }
        }

        Ok(sheet)
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        self.read_optional_file(archive, path)?
            .ok_or_else(|| Error::ZipError(format!("File not found in archive '{}'", path)))
    }

    /// Read a file from the ZIP archive, or `None` if it is absent.
    fn read_optional_file<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<Option<String>> {
        let mut file = match archive.by_name(path) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(Error::ZipError(format!("Failed to open '{}': {}", path, e))),
        };

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(Some(content))
    }
}

impl Default for XlsxReader {
    fn default() -> Self {
        Self::new()
    }
}

/// A `<c>` element being read.
#[derive(Debug)]
struct PendingCell {
    row: u32,
    col: u32,
    kind: Option<String>,
    raw: String,
}

impl PendingCell {
    fn start(e: &BytesStart<'_>, current_row: u32, next_col: u32) -> Result<Self> {
        let (row, col) = attribute(e, b"r")
            .and_then(|r| parse_cell_ref(&r))
            .unwrap_or((current_row, next_col));
        if row > MAX_ROWS || col > MAX_COLUMNS {
            return Err(out_of_range());
        }
        Ok(Self {
            row,
            col,
            kind: attribute(e, b"t"),
            raw: String::new(),
        })
    }

    /// Interpret the raw text according to the cell type.
    fn finish(self, shared: &[String]) -> Option<CellValue> {
        match self.kind.as_deref() {
            Some("s") => {
                let index: usize = self.raw.trim().parse().ok()?;
                match shared.get(index) {
                    Some(text) => Some(CellValue::Text(text.clone())),
                    None => {
                        log::warn!("Shared string {} out of range at row {}", index, self.row);
                        None
                    }
                }
            }
            Some("b") => Some(CellValue::Bool(self.raw.trim() == "1")),
            Some("inlineStr") | Some("str") | Some("e") => Some(CellValue::Text(self.raw)),
            _ => {
                if self.raw.trim().is_empty() {
                    return None;
                }
                match self.raw.trim().parse::<f64>() {
                    Ok(number) => Some(CellValue::Number(number)),
                    Err(_) => Some(CellValue::Text(self.raw)),
                }
            }
        }
    }
}

/// Find the target path of a workbook relationship, resolved against `xl/`.
fn find_relationship_target(rels_content: &str, rel_id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(rels_content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"Relationship" => {
                if attribute(e, b"Id").as_deref() != Some(rel_id) {
                    continue;
                }
                let Some(target) = attribute(e, b"Target") else {
                    return Ok(None);
                };
                let full_path = if let Some(stripped) = target.strip_prefix('/') {
                    stripped.to_string()
                } else {
                    format!("xl/{}", target)
                };
                return Ok(Some(full_path));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }
}

/// Row number of a `<row>` element, or the one after `current_row` when it
/// carries no usable reference.
fn row_number(e: &BytesStart<'_>, current_row: u32) -> Result<u32> {
    match attribute(e, b"r").and_then(|r| r.parse::<u32>().ok()) {
        Some(row) if row <= MAX_ROWS => Ok(row),
        Some(_) => Err(out_of_range()),
        None => current_row
            .checked_add(1)
            .filter(|row| *row <= MAX_ROWS)
            .ok_or_else(out_of_range),
    }
}

fn out_of_range() -> Error {
    Error::SpreadsheetError("Row or column reference out of range".to_string())
}

/// Read an attribute by local name, ignoring any namespace prefix.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Split a cell reference like "F12" into 1-based (row, column).
fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let col = letters
        .chars()
        .try_fold(0u32, |acc, c| {
            let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
            acc.checked_mul(26)?.checked_add(digit)
        })?;
    let row = digits.parse().ok()?;
    Some((row, col))
}
