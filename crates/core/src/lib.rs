//! Core types for treesnap
//!
//! This crate defines the pieces shared by the archive layer and the engine:
//! - SnapshotTag: validated user-supplied snapshot tag
//! - SnapshotName: the `<prefix>_snapshot_<tag>_<timestamp>` naming convention
//! - SnapshotMetadata: the JSON record embedded in every snapshot archive
//! - IgnoreRules / filter_tree: which source entries are copied into a snapshot
//! - Limits: safety ceilings applied when validating archives
//! - EntryFailure: per-entry failure collected by best-effort bulk operations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ignore;
pub mod limits;
pub mod metadata;
pub mod naming;
pub mod tag;

pub use error::{EntryFailure, IgnoreError};
pub use ignore::{filter_tree, EntryKind, IgnoreRules, TreeEntry, DEFAULT_IGNORE_PATTERNS};
pub use limits::{Limits, DEFAULT_MAX_SNAPSHOTS, DEFAULT_MAX_UNCOMPRESSED_BYTES};
pub use metadata::{GitInfo, SnapshotMetadata, SystemInfo, METADATA_FILE_NAME};
pub use naming::{
    bundle_file_name, compact_timestamp, date_stamp, snapshot_timestamp, vcs_tag_name,
    SnapshotName, ARCHIVE_EXTENSION, REPO_ROOT,
};
pub use tag::{SnapshotTag, TagError, MAX_TAG_LENGTH};
