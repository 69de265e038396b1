//! Snapshot creation
//!
//! ```text
//! validate tag ─► stage (filtered copy) ─► normalize modes ─► metadata
//!   ─► hash ─► [duplicate? stop] ─► pack to .tmp ─► validate ─► rename
//!   ─► re-validate ─► record hash ─► tag in VCS ─► cleanup
//! ```
//!
//! The staging directory is private to one call and always removed. Nothing
//! is ever left at the final archive path unless it passed validation.

use crate::engine::SnapshotEngine;
use crate::error::CreateError;
use crate::retention::{CleanupReport, SnapshotInfo};
use crate::tree;
use chrono::{DateTime, Local};
use std::fs;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use treesnap_archive::{ArchiveWriter, PackOptions};
use treesnap_core::{
    snapshot_timestamp, vcs_tag_name, GitInfo, SnapshotMetadata, SnapshotName, SnapshotTag,
    SystemInfo, REPO_ROOT,
};

/// Prefix of per-call staging directories under the snapshot directory
pub const STAGE_DIR_PREFIX: &str = ".stage_";

/// Result of a successful create
#[derive(Debug, Clone)]
pub struct CreateReport {
    /// The installed, validated snapshot
    pub snapshot: SnapshotInfo,
    /// SHA-256 of the staged tree
    pub content_hash: String,
    /// Entries (files and directories) copied from the working tree
    pub entries_staged: usize,
    /// Whether the version-control collaborator accepted the tag
    pub vcs_tagged: bool,
    /// Retention pass run after install (`None` if it failed)
    pub cleanup: Option<CleanupReport>,
}

impl SnapshotEngine {
    /// Create a snapshot of the working tree
    ///
    /// # Errors
    ///
    /// - `InvalidTag`: checked before any filesystem access
    /// - `DuplicateContent`: the tree is byte-identical to one this engine
    ///   already snapshotted; no archive is written
    /// - `Staging` / `Metadata`: the stage could not be prepared
    /// - `PackingFailed` / `ValidationFailed`: nothing is left at the final path
    pub fn create(&self, tag: &str, description: &str) -> Result<CreateReport, CreateError> {
        let tag = SnapshotTag::new(tag)?;
        let now = Local::now();

        let stage = tempfile::Builder::new()
            .prefix(STAGE_DIR_PREFIX)
            .tempdir_in(self.paths.snapshot_dir())
            .map_err(|e| CreateError::staging(format!("create staging directory: {}", e)))?;
        let stage_repo = stage.path().join(REPO_ROOT);

        let entries_staged =
            tree::stage_tree(self.paths.repo(), &stage_repo, &self.rules, &self.protected)
                .map_err(|e| CreateError::staging(e.to_string()))?;
        tree::normalize_permissions(&stage_repo)
            .map_err(|e| CreateError::staging(format!("normalize permissions: {}", e)))?;

        let metadata = self.build_metadata(&tag, description, &now);
        let metadata_json = metadata
            .to_json_pretty()
            .map_err(|e| CreateError::Metadata(e.to_string()))?;

        let content_hash = tree::hash_tree(&stage_repo)
            .map_err(|e| CreateError::staging(format!("hash staged tree: {}", e)))?;
        if self.has_seen(&content_hash) {
            info!(
                target: "treesnap::builder",
                tag = %tag,
                hash = %content_hash,
                "Tree unchanged since an earlier snapshot, skipping"
            );
            return Err(CreateError::DuplicateContent { hash: content_hash });
        }

        let name = SnapshotName::new(self.config.prefix.clone(), tag.clone(), &now);
        let path = self.paths.snapshot_path(&name);
        let writer = ArchiveWriter::new(PackOptions::default().with_limits(self.config.limits()));
        let archive = writer.write(&stage_repo, &metadata_json, &path).map_err(|e| {
            warn!(
                target: "treesnap::builder",
                tag = %tag,
                error = %e,
                "Snapshot creation failed"
            );
            CreateError::from(e)
        })?;

        self.seen_hashes.lock().insert(content_hash.clone());

        if let Err(e) = stage.close() {
            debug!(target: "treesnap::builder", error = %e, "Failed to remove staging directory");
        }

        let vcs_tagged = self.notify_tag(&tag, &now, &metadata_json);

        let cleanup = match self.cleanup() {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(target: "treesnap::builder", error = %e, "Post-create cleanup failed");
                None
            }
        };

        info!(
            target: "treesnap::builder",
            path = %path.display(),
            tag = %tag,
            size_bytes = archive.size_bytes,
            entries = entries_staged,
            "Snapshot created"
        );

        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());

        Ok(CreateReport {
            snapshot: SnapshotInfo {
                file_name: name.file_name(),
                path,
                metadata,
                size_bytes: archive.size_bytes,
                modified,
            },
            content_hash,
            entries_staged,
            vcs_tagged,
            cleanup,
        })
    }

    fn build_metadata(
        &self,
        tag: &SnapshotTag,
        description: &str,
        now: &DateTime<Local>,
    ) -> SnapshotMetadata {
        SnapshotMetadata {
            timestamp: now.to_rfc3339(),
            tag: tag.to_string(),
            description: description.to_string(),
            repo_path: self.paths.repo().to_string_lossy().into_owned(),
            system: SystemInfo::current(),
            git: self.git_info(),
        }
    }

    fn git_info(&self) -> Option<GitInfo> {
        let vcs = self.vcs.as_ref()?;
        match vcs.status() {
            Ok(status) => Some(GitInfo {
                branch: status.branch,
                commit: status.last_commit.map(|c| c.hash),
            }),
            Err(e) => {
                warn!(
                    target: "treesnap::builder",
                    error = %e,
                    "Could not read repository status, omitting git metadata"
                );
                None
            }
        }
    }

    fn notify_tag(&self, tag: &SnapshotTag, now: &DateTime<Local>, annotation: &[u8]) -> bool {
        let Some(vcs) = self.vcs.as_ref() else {
            return false;
        };
        let tag_name = vcs_tag_name(tag, &snapshot_timestamp(now));
        let tagged = vcs.create_tag(&tag_name, &String::from_utf8_lossy(annotation));
        if !tagged {
            warn!(
                target: "treesnap::builder",
                tag = %tag_name,
                "Version-control tag failed, snapshot kept"
            );
        }
        tagged
    }
}
