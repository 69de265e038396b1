//! Shared error types
//!
//! Per-operation error enums live next to the operations that raise them
//! (archive, engine). This module holds the pieces used across crates.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single entry that a best-effort bulk operation could not process
///
/// Bulk copy and delete steps skip failing entries instead of aborting; the
/// skipped entries are collected and surfaced as a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    /// Path of the entry that failed
    pub path: PathBuf,
    /// Human-readable cause
    pub reason: String,
}

impl EntryFailure {
    /// Record a failure for `path`
    pub fn new(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        EntryFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Error building an ignore rule set
#[derive(Debug, Error)]
pub enum IgnoreError {
    /// A pattern is not a valid glob
    #[error("Invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Parser message
        reason: String,
    },
}
