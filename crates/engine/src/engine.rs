//! Snapshot engine
//!
//! [`SnapshotEngine`] owns everything scoped to one working tree and snapshot
//! directory pair: paths, ignore rules, validator limits, the optional
//! version-control collaborator, and the set of content hashes already
//! snapshotted by this instance. The operations themselves live in
//! `builder` (create), `restore`, and `retention`.
//!
//! The snapshot directory may live inside the working tree (the default
//! layout is `./.treesnap/snapshots`). `open` records such nesting in
//! [`ProtectedPaths`] so that staging, backup, clear, and install never
//! reach into the engine's own files.

use crate::config::SnapshotConfig;
use crate::error::SetupError;
use crate::paths::SnapshotPaths;
use crate::testing::CrashPoint;
use crate::tree::ProtectedPaths;
use crate::vcs::VersionControl;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use tracing::{debug, info};
use treesnap_archive::ArchiveReader;
use treesnap_core::IgnoreRules;

/// Snapshot/restore engine for one working tree
pub struct SnapshotEngine {
    pub(crate) config: SnapshotConfig,
    pub(crate) paths: SnapshotPaths,
    pub(crate) rules: IgnoreRules,
    pub(crate) protected: ProtectedPaths,
    pub(crate) seen_hashes: Mutex<HashSet<String>>,
    pub(crate) vcs: Option<Box<dyn VersionControl>>,
    pub(crate) crash_points: HashSet<CrashPoint>,
}

impl SnapshotEngine {
    /// Open an engine, creating the snapshot directory (0700) and the working
    /// tree if absent
    ///
    /// # Errors
    ///
    /// - `InvalidConfig`: the prefix or size ceiling is out of range
    /// - `DirectorySetupFailed`: a directory could not be created
    /// - `InvalidIgnore`: a configured ignore pattern does not compile
    /// - `OverlappingDirectories`: the working tree is inside the snapshot directory
    pub fn open(config: SnapshotConfig) -> Result<Self, SetupError> {
        config.validate()?;
        let rules = IgnoreRules::with_defaults(&config.ignore)?;

        let paths = SnapshotPaths::new(&config.repo_path, &config.snapshot_dir);
        paths.create_directories()?;

        // Metadata records absolute paths
        let repo = fs::canonicalize(paths.repo()).map_err(|source| {
            SetupError::DirectorySetupFailed {
                path: paths.repo().to_path_buf(),
                source,
            }
        })?;
        let snapshot_dir = fs::canonicalize(paths.snapshot_dir()).map_err(|source| {
            SetupError::DirectorySetupFailed {
                path: paths.snapshot_dir().to_path_buf(),
                source,
            }
        })?;
        if repo.starts_with(&snapshot_dir) {
            return Err(SetupError::OverlappingDirectories { repo, snapshot_dir });
        }
        let paths = SnapshotPaths::new(repo, snapshot_dir);
        let protected = ProtectedPaths::within(
            paths.repo(),
            &[paths.snapshot_dir(), paths.archive_dir().as_path()],
        );
        if !protected.paths().is_empty() {
            debug!(
                target: "treesnap::engine",
                protected = ?protected.paths(),
                "Engine directories nested in the working tree"
            );
        }

        info!(
            target: "treesnap::engine",
            repo = %paths.repo().display(),
            snapshot_dir = %paths.snapshot_dir().display(),
            max_snapshots = config.retention_cap(),
            "Snapshot engine ready"
        );

        Ok(SnapshotEngine {
            config,
            paths,
            rules,
            protected,
            seen_hashes: Mutex::new(HashSet::new()),
            vcs: None,
            crash_points: HashSet::new(),
        })
    }

    /// Attach a version-control collaborator
    pub fn with_vcs(mut self, vcs: Box<dyn VersionControl>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// Arm a [`CrashPoint`] so the matching restore step fails
    pub fn with_crash_point(mut self, point: CrashPoint) -> Self {
        self.crash_points.insert(point);
        self
    }

    /// Managed paths (absolute)
    pub fn paths(&self) -> &SnapshotPaths {
        &self.paths
    }

    /// Configuration this engine was opened with
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Working-tree subtrees that tree operations leave alone
    pub fn protected_paths(&self) -> &ProtectedPaths {
        &self.protected
    }

    /// Whether this engine has already snapshotted a tree with `hash`
    pub fn has_seen(&self, hash: &str) -> bool {
        self.seen_hashes.lock().contains(hash)
    }

    pub(crate) fn reader(&self) -> ArchiveReader {
        ArchiveReader::new(self.config.limits())
    }

    pub(crate) fn crash_armed(&self, point: CrashPoint) -> bool {
        self.crash_points.contains(&point)
    }
}

impl fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotEngine")
            .field("paths", &self.paths)
            .field("max_snapshots", &self.config.retention_cap())
            .field("seen_hashes", &self.seen_hashes.lock().len())
            .field("protected", &self.protected.paths())
            .field("vcs", &self.vcs.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directories() {
        let dir = TempDir::new().unwrap();
        let config = SnapshotConfig::new(dir.path().join("repo"), dir.path().join("state/snaps"));

        let engine = SnapshotEngine::open(config).unwrap();

        assert!(engine.paths().repo().is_dir());
        assert!(engine.paths().snapshot_dir().is_dir());
        assert!(engine.paths().repo().is_absolute());
        assert!(!engine.has_seen("anything"));
    }

    #[test]
    fn test_open_rejects_bad_ignore_pattern() {
        let dir = TempDir::new().unwrap();
        let config = SnapshotConfig::new(dir.path().join("repo"), dir.path().join("snaps"))
            .with_ignore(["[broken"]);

        assert!(matches!(
            SnapshotEngine::open(config),
            Err(SetupError::InvalidIgnore(_))
        ));
    }

    #[test]
    fn test_open_validates_config() {
        let dir = TempDir::new().unwrap();
        let base = SnapshotConfig::new(dir.path().join("repo"), dir.path().join("snaps"));

        for config in [
            base.clone().with_prefix("../../outside"),
            base.clone().with_prefix(""),
            base.clone().with_max_uncompressed_bytes(0),
        ] {
            assert!(matches!(
                SnapshotEngine::open(config),
                Err(SetupError::InvalidConfig(_))
            ));
        }
        // Rejected before any directory is created
        assert!(!dir.path().join("snaps").exists());
    }

    #[test]
    fn test_open_rejects_tree_inside_snapshot_dir() {
        let dir = TempDir::new().unwrap();
        let snaps = dir.path().join("snaps");

        for repo in [snaps.clone(), snaps.join("repo")] {
            let config = SnapshotConfig::new(repo, &snaps);
            assert!(matches!(
                SnapshotEngine::open(config),
                Err(SetupError::OverlappingDirectories { .. })
            ));
        }
    }

    #[test]
    fn test_open_protects_nested_engine_dirs() {
        let dir = TempDir::new().unwrap();
        let config = SnapshotConfig::new(dir.path(), dir.path().join(".treesnap/snapshots"));

        let engine = SnapshotEngine::open(config).unwrap();

        assert_eq!(
            engine.protected_paths().paths(),
            &[
                std::path::PathBuf::from(".treesnap/archive"),
                std::path::PathBuf::from(".treesnap/snapshots"),
            ]
        );
    }

    #[test]
    fn test_sibling_layout_protects_nothing() {
        let dir = TempDir::new().unwrap();
        let config = SnapshotConfig::new(dir.path().join("repo"), dir.path().join("snaps"));

        let engine = SnapshotEngine::open(config).unwrap();

        assert!(engine.protected_paths().paths().is_empty());
    }

    #[test]
    fn test_open_fails_when_directory_blocked() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let config = SnapshotConfig::new(dir.path().join("repo"), blocker.join("snaps"));

        assert!(matches!(
            SnapshotEngine::open(config),
            Err(SetupError::DirectorySetupFailed { .. })
        ));
    }
}
