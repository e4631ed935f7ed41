//! Domain types for status update rows and the generation request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column headers sent with every generation request, in table order.
pub const FIXED_COLUMNS: [&str; 7] = [
    "Sl no.",
    "Brief about change",
    "What is the impact",
    "Dev effort",
    "Remarks",
    "Gone Live/ETA",
    "Status",
];

/// Request discriminator expected by the generation service.
pub const REQUEST_TYPE: &str = "project_update";

/// Suggested values for the effort column.
pub const EFFORT_OPTIONS: [&str; 4] = ["S", "M", "L", "XL"];

/// Suggested values for the status column.
pub const STATUS_OPTIONS: [&str; 4] = ["Action Over", "In Progress", "Not as per Plan", "Yet to Start"];

/// Suggested team tags for the title.
pub const TAG_OPTIONS: [&str; 20] = [
    "Consumer Durables",
    "Cross Sell PL",
    "Insta PL",
    "E-COM",
    "DPL",
    "OMPL",
    "Gold Loan",
    "Two Wheeler",
    "Used Car",
    "UCV",
    "Mid Corporate",
    "Affordable LAP",
    "3W",
    "Tractors",
    "Dealer App",
    "WhatsApp, IVR and Chatbot",
    "Lead Management System",
    "HR & VMS",
    "CRM",
    "Saathi App",
];

/// Suggested subtags for the title.
pub const SUBTAG_OPTIONS: [&str; 1] = ["Key Enhancements"];

/// One of the six editable fields of a row, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowField {
    Brief,
    Impact,
    Effort,
    Remarks,
    Eta,
    Status,
}

impl RowField {
    /// All fields in the order they appear in the table.
    pub const ALL: [RowField; 6] = [
        RowField::Brief,
        RowField::Impact,
        RowField::Effort,
        RowField::Remarks,
        RowField::Eta,
        RowField::Status,
    ];

    /// Column header for this field.
    pub fn label(self) -> &'static str {
        match self {
            RowField::Brief => "Brief about change",
            RowField::Impact => "What is the impact",
            RowField::Effort => "Dev effort",
            RowField::Remarks => "Remarks",
            RowField::Eta => "Gone Live/ETA",
            RowField::Status => "Status",
        }
    }

    /// Field name as used in drafts and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            RowField::Brief => "brief",
            RowField::Impact => "impact",
            RowField::Effort => "effort",
            RowField::Remarks => "remarks",
            RowField::Eta => "eta",
            RowField::Status => "status",
        }
    }

    /// Parse a field from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Suggestion list for the enum-like fields.
    pub fn options(self) -> Option<&'static [&'static str]> {
        match self {
            RowField::Effort => Some(&EFFORT_OPTIONS),
            RowField::Status => Some(&STATUS_OPTIONS),
            _ => None,
        }
    }
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single status update row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Row {
    pub brief: String,
    pub impact: String,
    pub effort: String,
    pub remarks: String,
    /// Go-live date or ETA as `dd/mm/yyyy` text.
    pub eta: String,
    pub status: String,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one field.
    pub fn get(&self, field: RowField) -> &str {
        match field {
            RowField::Brief => &self.brief,
            RowField::Impact => &self.impact,
            RowField::Effort => &self.effort,
            RowField::Remarks => &self.remarks,
            RowField::Eta => &self.eta,
            RowField::Status => &self.status,
        }
    }

    /// Replace one field.
    pub fn set(&mut self, field: RowField, value: impl Into<String>) {
        let slot = match field {
            RowField::Brief => &mut self.brief,
            RowField::Impact => &mut self.impact,
            RowField::Effort => &mut self.effort,
            RowField::Remarks => &mut self.remarks,
            RowField::Eta => &mut self.eta,
            RowField::Status => &mut self.status,
        };
        *slot = value.into();
    }

    /// True when brief, impact, and effort are all blank.
    ///
    /// This is the emptiness test used by the single-row submit guard; the
    /// remaining fields are ignored.
    pub fn is_blank(&self) -> bool {
        self.brief.trim().is_empty() && self.impact.trim().is_empty() && self.effort.trim().is_empty()
    }

    /// Render as the seven table cells sent to the service.
    pub fn to_cells(&self, serial: usize) -> Vec<String> {
        let mut cells = Vec::with_capacity(FIXED_COLUMNS.len());
        cells.push(serial.to_string());
        cells.extend(RowField::ALL.iter().map(|&field| self.get(field).to_string()));
        cells
    }
}

/// Body of a structured generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdateRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub columns: Vec<String>,
    pub content: Vec<Vec<String>>,
}

impl ProjectUpdateRequest {
    /// Build a request from a title and rows, numbering rows from 1.
    pub fn new(title: impl Into<String>, rows: &[Row]) -> Self {
        Self {
            kind: REQUEST_TYPE.to_string(),
            title: title.into(),
            columns: FIXED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            content: rows
                .iter()
                .enumerate()
                .map(|(idx, row)| row.to_cells(idx + 1))
                .collect(),
        }
    }
}
