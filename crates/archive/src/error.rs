//! Archive error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// File does not start with a gzip header
    #[error("Not a gzip-compressed archive: {0}")]
    NotCompressed(PathBuf),

    /// Tar or gzip stream is damaged or truncated
    #[error("Malformed archive: {0}")]
    Malformed(String),

    /// Entry name escapes the extraction root or has a forbidden type
    #[error("Unsafe archive entry '{name}': {reason}")]
    UnsafeEntry {
        /// Raw entry name as stored in the archive
        name: String,
        /// Why the entry was rejected
        reason: String,
    },

    /// Declared uncompressed size exceeds the safety ceiling
    #[error("Archive exceeds size limit: {total} bytes declared (max {limit})")]
    SizeLimitExceeded {
        /// Running total at the point the ceiling was crossed
        total: u64,
        /// Configured ceiling
        limit: u64,
    },

    /// Reserved metadata entry not present
    #[error("Missing required entry in archive: {0}")]
    MissingEntry(String),

    /// Packing or pre-install validation failed; nothing was installed
    #[error("Packing failed: {0}")]
    PackingFailed(String),

    /// Archive failed validation after being renamed into place; it was removed
    #[error("Installed archive failed validation: {}", path.display())]
    InstalledCorrupt {
        /// Final path that failed re-validation
        path: PathBuf,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArchiveError {
    /// Create a malformed-archive error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Create an unsafe-entry error
    pub fn unsafe_entry(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsafeEntry {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a packing error
    pub fn packing(msg: impl Into<String>) -> Self {
        Self::PackingFailed(msg.into())
    }

    /// Create a missing-entry error
    pub fn missing_entry(name: impl Into<String>) -> Self {
        Self::MissingEntry(name.into())
    }

    /// Whether this error means the archive itself is bad (as opposed to an
    /// environmental failure such as a missing file)
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            ArchiveError::NotCompressed(_)
                | ArchiveError::Malformed(_)
                | ArchiveError::UnsafeEntry { .. }
                | ArchiveError::SizeLimitExceeded { .. }
                | ArchiveError::MissingEntry(_)
                | ArchiveError::Json(_)
        )
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
