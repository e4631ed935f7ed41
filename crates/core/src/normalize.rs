//! Cell text normalization for imported spreadsheet values.
//!
//! Spreadsheet cells arrive with stray whitespace, Windows line endings,
//! and decomposed Unicode. Validation counts characters, so text is brought
//! to NFC before it is measured.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse multiple whitespace characters into one.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x{a0}]+").unwrap());

/// Cell text normalizer.
#[derive(Debug, Clone)]
pub struct CellNormalizer {
    /// Whether to keep line breaks inside a cell.
    preserve_line_breaks: bool,
}

impl Default for CellNormalizer {
    fn default() -> Self {
        Self {
            preserve_line_breaks: true,
        }
    }
}

impl CellNormalizer {
    /// Create a normalizer that keeps in-cell line breaks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to preserve line breaks.
    pub fn with_preserve_line_breaks(mut self, preserve: bool) -> Self {
        self.preserve_line_breaks = preserve;
        self
    }

    /// Normalize a single cell.
    ///
    /// - Composes Unicode to NFC
    /// - Converts `\r\n` and `\r` to `\n`
    /// - Collapses runs of spaces and tabs
    /// - Trims every line and drops blank lines
    pub fn normalize(&self, text: &str) -> String {
        let composed: String = text.nfc().collect();
        let unified = composed.replace("\r\n", "\n").replace('\r', "\n");

        let lines = unified
            .lines()
            .map(|line| WHITESPACE_COLLAPSE_REGEX.replace_all(line, " ").trim().to_string())
            .filter(|line| !line.is_empty());

        if self.preserve_line_breaks {
            lines.collect::<Vec<_>>().join("\n")
        } else {
            lines.collect::<Vec<_>>().join(" ")
        }
    }
}
