//! Shared primitives used across CodeQuest crates.

use core::fmt;

/// Result alias used across the workspace.
pub type EditorResult<T> = Result<T, EditorError>;

/// Top-level error type for the editor core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorError {
    pub code: &'static str,
    pub message: String,
}

impl EditorError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for EditorError {}
