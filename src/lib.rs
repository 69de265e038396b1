//! treesnap - point-in-time snapshots and safe rollback of a working directory
//!
//! treesnap captures a directory tree into compressed, self-describing
//! archives, keeps a bounded history of them, and restores any of them with
//! a backup taken first and automatic recovery if the restore fails midway.
//!
//! # Quick Start
//!
//! ```ignore
//! use treesnap::{SnapshotConfig, SnapshotEngine};
//!
//! let engine = SnapshotEngine::open(SnapshotConfig::new("./project", "./.treesnap/snapshots"))?;
//!
//! // Snapshot the tree
//! let report = engine.create("nightly", "before refactor")?;
//!
//! // ...later, roll back
//! let outcome = engine.restore(&report.snapshot.path, true);
//! assert!(outcome.is_success());
//! ```
//!
//! # Architecture
//!
//! All operations go through [`SnapshotEngine`]. The archive container and
//! the naming/metadata types are re-exported for callers that inspect
//! snapshot files directly.

pub use treesnap_archive::{ArchiveError, ArchiveReader, ArchiveStats, BundleInfo};
pub use treesnap_core::{
    EntryFailure, GitInfo, IgnoreRules, Limits, SnapshotMetadata, SnapshotName, SnapshotTag,
    SystemInfo, TagError,
};
pub use treesnap_engine::*;
