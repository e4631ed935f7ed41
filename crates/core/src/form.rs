//! In-memory form state: the title triple and the row table.
//!
//! Validation state is derived from the rows on every read rather than
//! stored, so it can never go stale after an edit or removal.

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::eta::{decode_eta, encode_eta, is_encodable};
use crate::types::{ProjectUpdateRequest, Row, RowField, SUBTAG_OPTIONS, TAG_OPTIONS};
use crate::validation::{has_validation_errors, validate_all_rows, RowErrors};

/// Editable status update form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusForm {
    tag: String,
    subtag: String,
    metadata: String,
    rows: Vec<Row>,
}

impl Default for StatusForm {
    fn default() -> Self {
        Self {
            tag: String::new(),
            subtag: String::new(),
            metadata: String::new(),
            rows: vec![Row::new()],
        }
    }
}

impl StatusForm {
    /// Create a form with blank title fields and a single empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a form from existing parts.
    ///
    /// An empty row list becomes a single empty row.
    pub fn from_parts(
        tag: impl Into<String>,
        subtag: impl Into<String>,
        metadata: impl Into<String>,
        mut rows: Vec<Row>,
    ) -> Self {
        if rows.is_empty() {
            rows.push(Row::new());
        }
        Self {
            tag: tag.into(),
            subtag: subtag.into(),
            metadata: metadata.into(),
            rows,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn subtag(&self) -> &str {
        &self.subtag
    }

    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
    }

    pub fn set_subtag(&mut self, subtag: impl Into<String>) {
        self.subtag = subtag.into();
    }

    pub fn set_metadata(&mut self, metadata: impl Into<String>) {
        self.metadata = metadata.into();
    }

    /// Presentation title, `"<tag>: <subtag> - <metadata>"`.
    pub fn title(&self) -> String {
        format!("{}: {} - {}", self.tag, self.subtag, self.metadata)
    }

    /// Title parts that are filled in but not among the suggested values.
    ///
    /// Returns `("tag", value)` / `("subtag", value)` pairs. Advisory only.
    pub fn off_list_title_parts(&self) -> Vec<(&'static str, &str)> {
        [("tag", &self.tag, &TAG_OPTIONS[..]), ("subtag", &self.subtag, &SUBTAG_OPTIONS[..])]
            .into_iter()
            .filter_map(|(part, value, options)| {
                let value = value.trim();
                (!value.is_empty() && !options.contains(&value)).then_some((part, value))
            })
            .collect()
    }

    /// Rows in display order. Never empty.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Replace one field of one row.
    pub fn edit_field(&mut self, row_index: usize, field: RowField, value: impl Into<String>) -> Result<()> {
        let len = self.rows.len();
        let row = self
            .rows
            .get_mut(row_index)
            .ok_or(Error::RowOutOfBounds { index: row_index, len })?;
        row.set(field, value);
        Ok(())
    }

    /// Append an empty row.
    pub fn append_row(&mut self) {
        self.rows.push(Row::new());
    }

    /// Remove the last row if more than one remains.
    ///
    /// Returns whether a row was removed.
    pub fn remove_last_row(&mut self) -> bool {
        if self.rows.len() > 1 {
            self.rows.pop();
            true
        } else {
            false
        }
    }

    /// Store a picked date, or clear the eta when `date` is `None`.
    ///
    /// Dates outside years 0000 to 9999 are refused and leave the row as is.
    pub fn pick_eta(&mut self, row_index: usize, date: Option<NaiveDate>) -> Result<()> {
        if let Some(date) = date.filter(|d| !is_encodable(*d)) {
            return Err(Error::EtaOutOfRange(date));
        }
        let text = date.map(encode_eta).unwrap_or_default();
        self.edit_field(row_index, RowField::Eta, text)
    }

    /// Decoded eta of a row; `None` when unset or not in `dd/mm/yyyy` layout.
    pub fn eta_date(&self, row_index: usize) -> Option<NaiveDate> {
        self.rows.get(row_index).and_then(|row| decode_eta(&row.eta))
    }

    /// Field errors for every row, in row order.
    pub fn errors(&self) -> Vec<RowErrors> {
        validate_all_rows(&self.rows)
    }

    /// True while any row has a field error.
    pub fn has_errors(&self) -> bool {
        has_validation_errors(&self.errors())
    }

    /// Check submission preconditions and build the generation request.
    ///
    /// Checks run in order: title fields, the single blank row guard, then
    /// field validation. A lone row with blank brief, impact, and effort is
    /// never submittable; there are no title-only decks.
    pub fn build_request(&self) -> Result<ProjectUpdateRequest> {
        if [&self.tag, &self.subtag, &self.metadata]
            .iter()
            .any(|part| part.trim().is_empty())
        {
            return Err(Error::TitleIncomplete);
        }

        if self.rows.len() == 1 && self.rows.iter().any(Row::is_blank) {
            return Err(Error::NoRowData);
        }

        let invalid = self.errors().iter().filter(|e| !e.is_empty()).count();
        if invalid > 0 {
            return Err(Error::InvalidRows { rows: invalid });
        }

        Ok(ProjectUpdateRequest::new(self.title(), &self.rows))
    }
}
