//! Restore protocol
//!
//! ```text
//! Validating ─► Extracting ─► Backing-up ─► Clearing ─► Installing ─► (Notifying) ─► Done
//!                                              │            │
//!                                              └────────────┴─► Recovering ─► Failed
//! ```
//!
//! Until the backup exists the working tree is untouched, so failures up to
//! that point are [`RestoreOutcome::Aborted`]. Once clearing starts, a failure
//! that stops a whole step triggers recovery from the backup. Single entries
//! that cannot be removed or copied are skipped and reported as a
//! [`PartialCopyWarning`] without triggering recovery.

use crate::engine::SnapshotEngine;
use crate::error::RestoreError;
use crate::testing::CrashPoint;
use crate::tree;
use chrono::Local;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use treesnap_core::{compact_timestamp, EntryFailure, REPO_ROOT};

/// Prefix of per-call extraction directories under the snapshot directory
pub const RESTORE_DIR_PREFIX: &str = "restore_";

/// Entries skipped during an otherwise successful restore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialCopyWarning {
    /// Working-tree entries that could not be removed
    pub not_removed: Vec<EntryFailure>,
    /// Snapshot entries that could not be installed
    pub not_copied: Vec<EntryFailure>,
}

impl PartialCopyWarning {
    /// Whether nothing was skipped
    pub fn is_empty(&self) -> bool {
        self.not_removed.is_empty() && self.not_copied.is_empty()
    }

    /// Total skipped entries
    pub fn len(&self) -> usize {
        self.not_removed.len() + self.not_copied.len()
    }
}

impl fmt::Display for PartialCopyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries not removed, {} entries not restored",
            self.not_removed.len(),
            self.not_copied.len()
        )
    }
}

/// Terminal state of one restore call
#[derive(Debug)]
pub enum RestoreOutcome {
    /// Working tree now matches the snapshot
    Success {
        /// Pre-restore backup of the working tree
        backup: PathBuf,
    },
    /// Restored, but some entries were skipped
    SuccessWithWarnings {
        /// Pre-restore backup of the working tree
        backup: PathBuf,
        /// Skipped entries
        warning: PartialCopyWarning,
    },
    /// Failed before the working tree was touched
    Aborted(RestoreError),
    /// Failed after the tree was modified; the backup was put back
    FailedRecovered {
        /// What stopped the restore
        error: RestoreError,
        /// Backup that was restored
        backup: PathBuf,
    },
    /// Failed, and putting the backup back failed too
    FailedUnrecovered {
        /// What stopped the restore
        error: RestoreError,
        /// Why recovery failed
        recovery: RestoreError,
        /// Backup still holding the pre-restore tree
        backup: PathBuf,
    },
}

impl RestoreOutcome {
    /// Whether the snapshot content is now installed
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RestoreOutcome::Success { .. } | RestoreOutcome::SuccessWithWarnings { .. }
        )
    }

    /// Pre-restore backup directory, if one was made
    pub fn backup(&self) -> Option<&Path> {
        match self {
            RestoreOutcome::Success { backup }
            | RestoreOutcome::SuccessWithWarnings { backup, .. }
            | RestoreOutcome::FailedRecovered { backup, .. }
            | RestoreOutcome::FailedUnrecovered { backup, .. } => Some(backup),
            RestoreOutcome::Aborted(_) => None,
        }
    }

    /// The error that stopped the restore, if it failed
    pub fn error(&self) -> Option<&RestoreError> {
        match self {
            RestoreOutcome::Aborted(error)
            | RestoreOutcome::FailedRecovered { error, .. }
            | RestoreOutcome::FailedUnrecovered { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreOutcome::Success { .. } => write!(f, "restored"),
            RestoreOutcome::SuccessWithWarnings { warning, .. } => {
                write!(f, "restored with warnings ({})", warning)
            }
            RestoreOutcome::Aborted(e) => write!(f, "aborted, working tree unchanged: {}", e),
            RestoreOutcome::FailedRecovered { error, backup } => write!(
                f,
                "failed, working tree recovered from {}: {}",
                backup.display(),
                error
            ),
            RestoreOutcome::FailedUnrecovered {
                error,
                recovery,
                backup,
            } => write!(
                f,
                "failed ({}); recovery failed ({}); backup kept at {}",
                error,
                recovery,
                backup.display()
            ),
        }
    }
}

impl SnapshotEngine {
    /// Replace the working tree with the content of `snapshot`
    ///
    /// With `verify`, the snapshot must pass validation first. The
    /// extraction directory is removed on every path out of this call.
    pub fn restore(&self, snapshot: &Path, verify: bool) -> RestoreOutcome {
        let outcome = self.restore_inner(snapshot, verify);

        match &outcome {
            RestoreOutcome::Success { backup } => info!(
                target: "treesnap::restore",
                snapshot = %snapshot.display(),
                backup = %backup.display(),
                "Restore complete"
            ),
            RestoreOutcome::SuccessWithWarnings { warning, .. } => warn!(
                target: "treesnap::restore",
                snapshot = %snapshot.display(),
                skipped = warning.len(),
                "Restore complete with skipped entries"
            ),
            other => error!(
                target: "treesnap::restore",
                snapshot = %snapshot.display(),
                outcome = %other,
                "Restore failed"
            ),
        }

        if outcome.is_success() {
            self.notify_restore(snapshot);
        }
        outcome
    }

    fn restore_inner(&self, snapshot: &Path, verify: bool) -> RestoreOutcome {
        let reader = self.reader();
        if verify && !reader.validate_snapshot(snapshot) {
            return RestoreOutcome::Aborted(RestoreError::InvalidSnapshot {
                path: snapshot.to_path_buf(),
            });
        }

        let stamp = compact_timestamp(&Local::now());
        let extraction = match tempfile::Builder::new()
            .prefix(&format!("{}{}", RESTORE_DIR_PREFIX, stamp))
            .tempdir_in(self.paths.snapshot_dir())
        {
            Ok(dir) => dir,
            Err(e) => {
                return RestoreOutcome::Aborted(RestoreError::Extraction(format!(
                    "create extraction directory: {}",
                    e
                )))
            }
        };

        if let Err(e) = reader.extract_to(snapshot, extraction.path()) {
            return RestoreOutcome::Aborted(RestoreError::Extraction(e.to_string()));
        }
        let extracted = extraction.path().join(REPO_ROOT);
        if !extracted.is_dir() {
            return RestoreOutcome::Aborted(RestoreError::CorruptExtraction {
                path: snapshot.to_path_buf(),
            });
        }

        let backup = self.paths.backup_dir(&stamp);
        if let Err(e) = tree::backup_tree(self.paths.repo(), &backup, &self.protected) {
            let _ = fs::remove_dir_all(&backup);
            return RestoreOutcome::Aborted(RestoreError::BackupFailed(e.to_string()));
        }
        info!(
            target: "treesnap::restore",
            backup = %backup.display(),
            "Working tree backed up"
        );

        let outcome = match self.replace_tree(&extracted, CrashPoint::AfterClear) {
            Ok(warning) if warning.is_empty() => RestoreOutcome::Success { backup },
            Ok(warning) => RestoreOutcome::SuccessWithWarnings { backup, warning },
            Err(error) => self.recover(error, backup),
        };

        if let Err(e) = extraction.close() {
            warn!(
                target: "treesnap::restore",
                error = %e,
                "Failed to remove extraction directory"
            );
        }
        outcome
    }

    /// Clear the working tree and copy `source` in
    ///
    /// `crash_point` names the injected fault that applies to this call.
    fn replace_tree(
        &self,
        source: &Path,
        crash_point: CrashPoint,
    ) -> Result<PartialCopyWarning, RestoreError> {
        let repo = self.paths.repo();
        let not_removed = tree::clear_tree(repo, &self.protected)
            .map_err(|e| RestoreError::ClearFailed(e.to_string()))?;
        if self.crash_armed(crash_point) {
            return Err(RestoreError::InstallFailed(format!(
                "injected fault at {}",
                crash_point
            )));
        }
        let not_copied = tree::copy_best_effort(source, repo, &self.protected)
            .map_err(|e| RestoreError::InstallFailed(e.to_string()))?;
        Ok(PartialCopyWarning {
            not_removed,
            not_copied,
        })
    }

    fn recover(&self, error: RestoreError, backup: PathBuf) -> RestoreOutcome {
        warn!(
            target: "treesnap::restore",
            error = %error,
            backup = %backup.display(),
            "Restore failed, recovering working tree from backup"
        );
        match self.replace_tree(&backup, CrashPoint::DuringRecovery) {
            Ok(gaps) if gaps.is_empty() => RestoreOutcome::FailedRecovered { error, backup },
            Ok(gaps) => RestoreOutcome::FailedUnrecovered {
                error,
                recovery: RestoreError::RecoveryFailed(gaps.to_string()),
                backup,
            },
            Err(e) => RestoreOutcome::FailedUnrecovered {
                error,
                recovery: RestoreError::RecoveryFailed(e.to_string()),
                backup,
            },
        }
    }

    fn notify_restore(&self, snapshot: &Path) {
        let Some(vcs) = self.vcs.as_ref() else {
            return;
        };
        let name = snapshot
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| snapshot.display().to_string());
        if !vcs.commit_all(&format!("Restored from snapshot: {}", name)) {
            warn!(
                target: "treesnap::restore",
                snapshot = %name,
                "Version-control commit failed, restore kept"
            );
        }
    }
}
