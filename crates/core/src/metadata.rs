//! Snapshot metadata record
//!
//! Every snapshot archive carries one JSON document at the reserved entry
//! [`METADATA_FILE_NAME`]. It is human-readable with standard tools (`tar`,
//! `jq`) and is what the inventory reads back when listing snapshots.
//!
//! ```json
//! {
//!   "timestamp": "2024-03-09T07:05:01.123456+00:00",
//!   "tag": "nightly",
//!   "description": "before migration",
//!   "repo_path": "/srv/project",
//!   "system": { "runtime_version": "treesnap 0.1.0", "platform": "linux-x86_64" },
//!   "git": { "branch": "main", "commit": "4f2a..." }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Reserved, hidden archive entry holding the metadata document
pub const METADATA_FILE_NAME: &str = ".treesnap_meta.json";

/// Metadata embedded in a snapshot archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// ISO 8601 creation time
    pub timestamp: String,
    /// Snapshot tag (validated at creation)
    pub tag: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Absolute path of the snapshotted working tree
    pub repo_path: String,
    /// Host/runtime descriptors
    pub system: SystemInfo,
    /// Version-control position, when a collaborator reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitInfo>,
}

/// Runtime and platform that produced a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Producing tool and version
    pub runtime_version: String,
    /// `<os>-<arch>`
    pub platform: String,
}

impl SystemInfo {
    /// Describe the current process
    pub fn current() -> Self {
        SystemInfo {
            runtime_version: format!("treesnap {}", env!("CARGO_PKG_VERSION")),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

/// Version-control position at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    /// Active branch, if any
    pub branch: Option<String>,
    /// Last commit identifier, if any
    pub commit: Option<String>,
}

impl SnapshotMetadata {
    /// Serialize as the pretty-printed document stored in the archive
    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Parse the document stored in the archive
    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}
