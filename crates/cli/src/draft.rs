//! JSON drafts holding the title fields and rows of a form.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use status_core::{Row, StatusForm};
use std::fs;
use std::path::Path;

/// On-disk form state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Draft {
    pub tag: String,
    pub subtag: String,
    pub metadata: String,
    pub rows: Vec<Row>,
}

impl Draft {
    /// A draft with empty title fields and one empty row.
    pub fn blank() -> Self {
        Self {
            rows: vec![Row::new()],
            ..Self::default()
        }
    }

    /// Load a draft from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid draft {}", path.display()))
    }

    /// Write the draft as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, format!("{}\n", json))
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Snapshot a form for saving.
    pub fn from_form(form: &StatusForm) -> Self {
        Self {
            tag: form.tag().to_string(),
            subtag: form.subtag().to_string(),
            metadata: form.metadata().to_string(),
            rows: form.rows().to_vec(),
        }
    }

    /// Load into a form. An empty row list becomes one empty row.
    pub fn into_form(self) -> StatusForm {
        StatusForm::from_parts(self.tag, self.subtag, self.metadata, self.rows)
    }
}
