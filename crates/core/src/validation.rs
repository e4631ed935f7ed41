//! Per-row field validation.
//!
//! Every field is required; most also carry a maximum length. Rules are
//! evaluated in order and only the first failure per field is reported, so a
//! blank field reports "required" and nothing else.

use std::collections::BTreeMap;

use crate::types::{Row, RowField};

/// Field errors for one row. Empty means the row is valid.
pub type RowErrors = BTreeMap<RowField, String>;

/// A single check applied to a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Value must contain something other than whitespace.
    Required(&'static str),
    /// Value must not exceed this many characters.
    MaxChars(usize),
}

impl Rule {
    /// Check a value, returning the error message on failure.
    pub fn check(self, value: &str) -> Option<String> {
        match self {
            Rule::Required(message) if value.trim().is_empty() => Some(message.to_string()),
            Rule::MaxChars(max) if value.chars().count() > max => {
                Some(format!("Max {} characters", max))
            }
            _ => None,
        }
    }
}

impl RowField {
    /// Maximum character count, if the field has one.
    pub fn max_chars(self) -> Option<usize> {
        match self {
            RowField::Brief => Some(96),
            RowField::Impact => Some(84),
            RowField::Effort => Some(2),
            RowField::Remarks => Some(60),
            RowField::Eta => Some(10),
            RowField::Status => None,
        }
    }

    /// Message reported when the field is blank.
    pub fn required_message(self) -> &'static str {
        match self {
            RowField::Brief => "Brief about change is required",
            RowField::Impact => "What is the impact is required",
            RowField::Effort => "Dev effort is required",
            RowField::Remarks => "Remarks are required",
            RowField::Eta => "Gone Live/ETA is required",
            RowField::Status => "Status is required",
        }
    }

    /// Rules for this field, in evaluation order.
    pub fn rules(self) -> Vec<Rule> {
        let mut rules = vec![Rule::Required(self.required_message())];
        if let Some(max) = self.max_chars() {
            rules.push(Rule::MaxChars(max));
        }
        rules
    }
}

/// Validate one row.
pub fn validate_row(row: &Row) -> RowErrors {
    RowField::ALL
        .into_iter()
        .filter_map(|field| {
            let value = row.get(field);
            field
                .rules()
                .into_iter()
                .find_map(|rule| rule.check(value))
                .map(|message| (field, message))
        })
        .collect()
}

/// Validate every row, preserving order.
pub fn validate_all_rows(rows: &[Row]) -> Vec<RowErrors> {
    rows.iter().map(validate_row).collect()
}

/// True if any row has at least one field error.
pub fn has_validation_errors(errors: &[RowErrors]) -> bool {
    errors.iter().any(|row_errors| !row_errors.is_empty())
}

/// Enum-like fields whose value is not one of the suggested options.
///
/// Advisory only; these never block submission. Blank values are left to
/// [`validate_row`].
pub fn off_list_fields(row: &Row) -> Vec<RowField> {
    RowField::ALL
        .into_iter()
        .filter(|&field| {
            let value = row.get(field).trim();
            match field.options() {
                Some(options) => !value.is_empty() && !options.contains(&value),
                None => false,
            }
        })
        .collect()
}
