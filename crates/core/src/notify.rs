//! User-facing notifications for operation outcomes.

use std::fmt;

use crate::error::{Error, ErrorCategory};
use crate::session::{Operation, Saved};

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Destructive,
}

/// A single dismissable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Notification {
    /// Notification for a completed operation.
    pub fn success(saved: &Saved) -> Self {
        Self {
            severity: Severity::Success,
            title: "Success".to_string(),
            description: saved.operation.success_message().to_string(),
        }
    }

    /// Notification for a failed operation.
    ///
    /// Errors with no text of their own fall back to the operation's
    /// generic message.
    pub fn from_error(error: &Error, operation: Operation) -> Self {
        let title = match error.category() {
            ErrorCategory::Form => "Validation Error",
            ErrorCategory::File => "Invalid File",
            ErrorCategory::Service => "Error",
        };
        let message = error.to_string();
        let description = if message.trim().is_empty() {
            operation.fallback_message().to_string()
        } else {
            message
        };
        Self {
            severity: Severity::Destructive,
            title: title.to_string(),
            description,
        }
    }

    /// Notification for the result of an operation.
    pub fn from_result(result: &Result<Saved, Error>, operation: Operation) -> Self {
        match result {
            Ok(saved) => Self::success(saved),
            Err(error) => Self::from_error(error, operation),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}
