//! Engine error types
//!
//! One enum per operation family. Only [`SetupError`] is returned from
//! construction; everything else is scoped to a single create, restore, or
//! retention call.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use treesnap_archive::ArchiveError;
use treesnap_core::{IgnoreError, TagError};

/// Errors from [`SnapshotEngine::create`](crate::SnapshotEngine::create)
#[derive(Debug, Error)]
pub enum CreateError {
    /// Tag failed validation; nothing was touched on disk
    #[error("Invalid tag: {0}")]
    InvalidTag(#[from] TagError),

    /// An identical tree was already snapshotted by this engine
    #[error("Duplicate content: tree unchanged since an earlier snapshot (sha256 {hash})")]
    DuplicateContent {
        /// Content hash of the staged tree
        hash: String,
    },

    /// Copying the working tree into the staging area failed
    #[error("Staging failed: {0}")]
    Staging(String),

    /// Metadata record could not be produced
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Packing or pre-install validation failed; no archive was installed
    #[error("Packing failed: {0}")]
    PackingFailed(String),

    /// Installed archive failed re-validation and was removed
    #[error("Installed snapshot failed validation: {}", path.display())]
    ValidationFailed {
        /// Final path that failed
        path: PathBuf,
    },
}

impl CreateError {
    /// Create a staging error
    pub fn staging(msg: impl Into<String>) -> Self {
        CreateError::Staging(msg.into())
    }
}

impl From<ArchiveError> for CreateError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::InstalledCorrupt { path } => CreateError::ValidationFailed { path },
            ArchiveError::PackingFailed(msg) => CreateError::PackingFailed(msg),
            other => CreateError::PackingFailed(other.to_string()),
        }
    }
}

/// Errors from the restore protocol
#[derive(Debug, Error)]
pub enum RestoreError {
    /// Snapshot failed validation before anything was extracted
    #[error("Invalid snapshot: {}", path.display())]
    InvalidSnapshot {
        /// Snapshot that was rejected
        path: PathBuf,
    },

    /// Extraction into the private directory failed
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Extraction finished but the `repo/` subtree is missing
    #[error("Corrupt extraction: no repository subtree in {}", path.display())]
    CorruptExtraction {
        /// Snapshot that was extracted
        path: PathBuf,
    },

    /// Pre-restore backup could not be created
    #[error("Backup failed: {0}")]
    BackupFailed(String),

    /// Working tree could not be enumerated for clearing
    #[error("Clear failed: {0}")]
    ClearFailed(String),

    /// Extracted tree could not be copied into the working tree
    #[error("Install failed: {0}")]
    InstallFailed(String),

    /// Restoring the backup after a failure did not complete
    #[error("Recovery failed: {0}")]
    RecoveryFailed(String),
}

/// Errors from listing, cleanup, and overflow archival
#[derive(Debug, Error)]
pub enum RetentionError {
    /// Snapshot directory could not be read
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Bundle could not be written; no snapshot was deleted
    #[error("Bundle failed: {0}")]
    BundleFailed(#[from] ArchiveError),
}

/// Fatal errors opening an engine
#[derive(Debug, Error)]
pub enum SetupError {
    /// A managed directory could not be created
    #[error("Directory setup failed for {}: {source}", path.display())]
    DirectorySetupFailed {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Configured ignore patterns do not compile
    #[error(transparent)]
    InvalidIgnore(#[from] IgnoreError),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The working tree is the snapshot directory or lies inside it
    #[error(
        "Working tree {} must not be inside snapshot directory {}",
        repo.display(),
        snapshot_dir.display()
    )]
    OverlappingDirectories {
        /// Working tree root
        repo: PathBuf,
        /// Snapshot directory
        snapshot_dir: PathBuf,
    },
}

/// Errors reading or writing `treesnap.toml`
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Config file '{}': {source}", path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("Failed to parse config file '{}': {reason}", path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A value is out of range
    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue {
        /// Offending key
        key: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_errors_map_to_create_errors() {
        let err: CreateError = ArchiveError::InstalledCorrupt {
            path: PathBuf::from("/snaps/a.tar.gz"),
        }
        .into();
        assert!(matches!(err, CreateError::ValidationFailed { .. }));

        let err: CreateError = ArchiveError::packing("gzip finish").into();
        assert!(matches!(err, CreateError::PackingFailed(ref m) if m == "gzip finish"));

        let err: CreateError = ArchiveError::malformed("truncated").into();
        assert!(matches!(err, CreateError::PackingFailed(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CreateError::DuplicateContent {
            hash: "abc123".to_string(),
        };
        assert!(err.to_string().contains("abc123"));

        let err = SetupError::DirectorySetupFailed {
            path: PathBuf::from("/root/snaps"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/root/snaps"));
        assert!(err.to_string().contains("denied"));
    }
}
