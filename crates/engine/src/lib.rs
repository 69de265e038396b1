//! Snapshot/restore engine
//!
//! This crate orchestrates the core and archive layers:
//! - SnapshotEngine: directory setup and per-instance state
//! - Archive builder: stage, hash, pack, validate, install (`create`)
//! - Restore protocol: extract, backup, clear, install, recover (`restore`)
//! - Retention manager: `list`, `cleanup`, `archive_overflow`
//! - Configuration via `treesnap.toml`
//!
//! The engine is the only component that touches the working tree.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod paths;
pub mod restore;
pub mod retention;
pub mod testing;
pub mod tree;
pub mod vcs;

pub use builder::CreateReport;
pub use config::{SnapshotConfig, CONFIG_FILE_NAME};
pub use engine::SnapshotEngine;
pub use error::{ConfigError, CreateError, RestoreError, RetentionError, SetupError};
pub use paths::SnapshotPaths;
pub use restore::{PartialCopyWarning, RestoreOutcome};
pub use retention::{ArchiveReport, CleanupReport, SnapshotInfo};
pub use testing::CrashPoint;
pub use tree::ProtectedPaths;
pub use vcs::{CommitInfo, RepositoryStatus, VcsError, VersionControl};
