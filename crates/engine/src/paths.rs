//! Managed directory structure
//!
//! ```text
//! <repo>/                               # working tree (created if absent)
//! <snapshot_dir>/                       # owner-only (0700)
//! ├── <prefix>_snapshot_<tag>_<ts>.tar.gz
//! ├── pre_restore_backup_<YYYYMMDDHHMMSS>/
//! ├── .stage_*/                         # transient, per create
//! └── restore_<YYYYMMDDHHMMSS>*/        # transient, per restore
//! <snapshot_dir>/../archive/            # retention bundles
//! ```

use crate::error::SetupError;
use std::fs;
use std::path::{Path, PathBuf};
use treesnap_core::{bundle_file_name, SnapshotName};

/// Name of the retention bundle directory, a sibling of the snapshot directory
pub const ARCHIVE_DIR_NAME: &str = "archive";

/// Prefix of pre-restore backup directories
pub const BACKUP_DIR_PREFIX: &str = "pre_restore_backup_";

/// Managed paths for one engine
#[derive(Debug, Clone)]
pub struct SnapshotPaths {
    repo: PathBuf,
    snapshot_dir: PathBuf,
}

impl SnapshotPaths {
    /// Create paths for a working tree and snapshot directory
    pub fn new(repo: impl AsRef<Path>, snapshot_dir: impl AsRef<Path>) -> Self {
        SnapshotPaths {
            repo: repo.as_ref().to_path_buf(),
            snapshot_dir: snapshot_dir.as_ref().to_path_buf(),
        }
    }

    /// Working tree root
    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Snapshot directory
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Retention bundle directory
    pub fn archive_dir(&self) -> PathBuf {
        match self.snapshot_dir.parent() {
            Some(parent) => parent.join(ARCHIVE_DIR_NAME),
            None => self.snapshot_dir.join(ARCHIVE_DIR_NAME),
        }
    }

    /// Final path of a snapshot archive
    pub fn snapshot_path(&self, name: &SnapshotName) -> PathBuf {
        self.snapshot_dir.join(name.file_name())
    }

    /// Unused backup directory for a restore started at `stamp`
    ///
    /// Two restores within one second get `_1`, `_2`, ... suffixes.
    pub fn backup_dir(&self, stamp: &str) -> PathBuf {
        unique_path(&self.snapshot_dir, &format!("{}{}", BACKUP_DIR_PREFIX, stamp), "")
    }

    /// Unused bundle path for `date`
    ///
    /// An existing bundle of the same name is never overwritten; a counter is
    /// appended before the extension instead.
    pub fn bundle_path(&self, prefix: &str, date: &str) -> PathBuf {
        let file_name = bundle_file_name(prefix, date);
        let (stem, ext) = match file_name.find('.') {
            Some(idx) => file_name.split_at(idx),
            None => (file_name.as_str(), ""),
        };
        unique_path(&self.archive_dir(), stem, ext)
    }

    /// Create the snapshot directory (0700) and the working tree
    pub fn create_directories(&self) -> Result<(), SetupError> {
        create_private_dir(&self.snapshot_dir).map_err(|source| {
            SetupError::DirectorySetupFailed {
                path: self.snapshot_dir.clone(),
                source,
            }
        })?;
        fs::create_dir_all(&self.repo).map_err(|source| SetupError::DirectorySetupFailed {
            path: self.repo.clone(),
            source,
        })?;
        Ok(())
    }
}

fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{}{}", stem, ext));
    if !candidate.exists() {
        return candidate;
    }
    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;
    use treesnap_core::SnapshotTag;

    #[test]
    fn test_layout() {
        let paths = SnapshotPaths::new("/srv/project", "/srv/state/snapshots");
        assert_eq!(paths.repo(), Path::new("/srv/project"));
        assert_eq!(paths.archive_dir(), PathBuf::from("/srv/state/archive"));

        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let name = SnapshotName::new("treesnap", SnapshotTag::new("nightly").unwrap(), &at);
        assert_eq!(
            paths.snapshot_path(&name),
            PathBuf::from("/srv/state/snapshots/treesnap_snapshot_nightly_20240309_070501.tar.gz")
        );
    }

    #[test]
    fn test_create_directories() {
        let dir = tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path().join("repo"), dir.path().join("a/b/snaps"));
        paths.create_directories().unwrap();

        assert!(paths.repo().is_dir());
        assert!(paths.snapshot_dir().is_dir());
        // Created lazily by archive_overflow
        assert!(!paths.archive_dir().exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(paths.snapshot_dir()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_create_directories_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a dir").unwrap();

        let paths = SnapshotPaths::new(dir.path().join("repo"), blocker.join("snaps"));
        let err = paths.create_directories().unwrap_err();
        assert!(matches!(err, SetupError::DirectorySetupFailed { .. }));
    }

    #[test]
    fn test_backup_dir_collision() {
        let dir = tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path().join("repo"), dir.path());

        let first = paths.backup_dir("20240309070501");
        assert_eq!(first.file_name().unwrap(), "pre_restore_backup_20240309070501");
        fs::create_dir(&first).unwrap();

        let second = paths.backup_dir("20240309070501");
        assert_eq!(second.file_name().unwrap(), "pre_restore_backup_20240309070501_1");
    }

    #[test]
    fn test_bundle_path_collision() {
        let dir = tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path().join("repo"), dir.path().join("snaps"));
        fs::create_dir_all(paths.archive_dir()).unwrap();

        let first = paths.bundle_path("treesnap", "20240309");
        assert_eq!(
            first.file_name().unwrap(),
            "treesnap_snapshots_archive_20240309.tar.gz"
        );
        fs::write(&first, b"").unwrap();

        let second = paths.bundle_path("treesnap", "20240309");
        assert_eq!(
            second.file_name().unwrap(),
            "treesnap_snapshots_archive_20240309_1.tar.gz"
        );
    }
}
