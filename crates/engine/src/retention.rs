//! Retention manager
//!
//! Inventory and eviction of snapshot archives. Only files named like
//! snapshots for the configured prefix that pass snapshot validation are
//! counted; anything else in the directory is left alone.

use crate::engine::SnapshotEngine;
use crate::error::RetentionError;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};
use treesnap_archive::{ArchiveResult, BundleInfo, BundleWriter};
use treesnap_core::{date_stamp, EntryFailure, SnapshotMetadata, SnapshotName};

/// A validated snapshot on disk
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    /// Full path of the archive
    pub path: PathBuf,
    /// Archive file name
    pub file_name: String,
    /// Embedded metadata record
    pub metadata: SnapshotMetadata,
    /// Compressed size on disk
    pub size_bytes: u64,
    /// Filesystem modification time
    pub modified: SystemTime,
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Snapshots still retained
    pub kept: usize,
    /// Snapshots deleted, oldest first
    pub removed: Vec<PathBuf>,
    /// Snapshots that could not be deleted
    pub failures: Vec<EntryFailure>,
}

/// Outcome of an overflow archival pass
#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    /// Bundle written, if there was any overflow
    pub bundle: Option<BundleInfo>,
    /// Originals deleted after bundling
    pub removed: Vec<PathBuf>,
    /// Originals that were bundled but could not be deleted
    pub failures: Vec<EntryFailure>,
}

impl SnapshotEngine {
    /// Valid snapshots, newest first by modification time
    ///
    /// Invalid archives are logged and skipped, never returned.
    pub fn list(&self) -> Result<Vec<SnapshotInfo>, RetentionError> {
        let reader = self.reader();
        let mut snapshots = Vec::new();

        for entry in fs::read_dir(self.paths.snapshot_dir())? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(target: "treesnap::retention", error = %e, "Unreadable directory entry");
                    continue;
                }
            };
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if SnapshotName::parse(&file_name, &self.config.prefix).is_none() {
                continue;
            }
            let path = entry.path();
            let stat = match entry.metadata() {
                Ok(stat) if stat.is_file() => stat,
                Ok(_) => continue,
                Err(e) => {
                    warn!(target: "treesnap::retention", path = %path.display(), error = %e, "Cannot stat snapshot");
                    continue;
                }
            };

            if !reader.validate_snapshot(&path) {
                continue;
            }
            let metadata = match reader.read_metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(
                        target: "treesnap::retention",
                        path = %path.display(),
                        error = %e,
                        "Unreadable snapshot metadata, skipping"
                    );
                    continue;
                }
            };

            snapshots.push(SnapshotInfo {
                path,
                file_name,
                metadata,
                size_bytes: stat.len(),
                modified: stat.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        snapshots.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(snapshots)
    }

    /// Newest valid snapshot
    pub fn latest(&self) -> Result<Option<SnapshotInfo>, RetentionError> {
        Ok(self.list()?.into_iter().next())
    }

    /// Metadata of a snapshot, after validating it
    pub fn read_metadata(&self, path: &Path) -> ArchiveResult<SnapshotMetadata> {
        let reader = self.reader();
        reader.check_snapshot(path)?;
        reader.read_metadata(path)
    }

    /// Delete snapshots beyond the retention cap, oldest first
    ///
    /// A failed delete is logged and does not stop the rest.
    pub fn cleanup(&self) -> Result<CleanupReport, RetentionError> {
        let snapshots = self.list()?;
        let cap = self.config.retention_cap();
        let mut report = CleanupReport {
            kept: snapshots.len().min(cap),
            ..CleanupReport::default()
        };

        for snapshot in snapshots.iter().skip(cap).rev() {
            match fs::remove_file(&snapshot.path) {
                Ok(()) => {
                    info!(
                        target: "treesnap::retention",
                        path = %snapshot.path.display(),
                        "Removed old snapshot"
                    );
                    report.removed.push(snapshot.path.clone());
                }
                Err(e) => {
                    warn!(
                        target: "treesnap::retention",
                        path = %snapshot.path.display(),
                        error = %e,
                        "Failed to remove old snapshot"
                    );
                    report.failures.push(EntryFailure::new(&snapshot.path, e));
                }
            }
        }
        Ok(report)
    }

    /// Move snapshots beyond the retention cap into a dated bundle
    ///
    /// Originals are deleted only after the bundle is written and checked;
    /// if bundling fails nothing is deleted.
    pub fn archive_overflow(&self) -> Result<ArchiveReport, RetentionError> {
        let snapshots = self.list()?;
        let cap = self.config.retention_cap();
        let overflow: Vec<PathBuf> = snapshots
            .iter()
            .skip(cap)
            .rev()
            .map(|s| s.path.clone())
            .collect();

        if overflow.is_empty() {
            return Ok(ArchiveReport::default());
        }

        let archive_dir = self.paths.archive_dir();
        fs::create_dir_all(&archive_dir)?;
        let bundle_path = self
            .paths
            .bundle_path(&self.config.prefix, &date_stamp(&Local::now()));

        let bundle = BundleWriter::default()
            .write(&overflow, &bundle_path)
            .map_err(|e| {
                warn!(
                    target: "treesnap::retention",
                    path = %bundle_path.display(),
                    error = %e,
                    "Bundling failed, keeping originals"
                );
                RetentionError::BundleFailed(e)
            })?;

        let mut report = ArchiveReport::default();
        for path in overflow {
            match fs::remove_file(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) => {
                    warn!(
                        target: "treesnap::retention",
                        path = %path.display(),
                        error = %e,
                        "Bundled snapshot could not be removed"
                    );
                    report.failures.push(EntryFailure::new(&path, e));
                }
            }
        }

        info!(
            target: "treesnap::retention",
            bundle = %bundle.path.display(),
            archived = report.removed.len(),
            "Archived old snapshots"
        );
        report.bundle = Some(bundle);
        Ok(report)
    }
}
