//! Recoverable conditions met while loading or merging a document.
//!
//! None of these abort an operation. Each one is logged through `log` and
//! kept on the document so callers (and tests) can inspect what was skipped.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Quoting in a field instruction could not be parsed; switches were dropped
    #[error("Malformed field instruction {instruction:?}: {reason}")]
    MalformedInstruction { instruction: String, reason: String },

    /// A `\#` picture has no digit placeholders
    #[error("Invalid number format {pattern:?}")]
    InvalidNumberFormat { pattern: String },

    /// A `\@` picture could not be parsed
    #[error("Invalid date format {pattern:?}")]
    InvalidDateFormat { pattern: String },

    #[error("Switch {switch} has no argument in {instruction:?}")]
    MissingSwitchArgument { switch: String, instruction: String },

    #[error("Unknown switch {switch} in {instruction:?}")]
    UnknownSwitch { switch: String, instruction: String },

    /// A `separate` or `end` field character outside any field
    #[error("Stray {kind} field character in {part}")]
    StrayFieldChar { part: String, kind: String },

    /// A complex field whose markers sit under unrelated parents; left as is
    #[error("Field {instruction:?} in {part} spans an unsupported layout")]
    UnsupportedFieldLayout { part: String, instruction: String },
}

/// Warning collector owned by a document.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, warning: Warning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    #[inline]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Drain collected warnings.
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}
