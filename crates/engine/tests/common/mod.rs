//! Shared test utilities for the engine integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use filetime::FileTime;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::{Builder, EntryType, Header};
use tempfile::TempDir;
use treesnap_engine::{
    CommitInfo, RepositoryStatus, SnapshotConfig, SnapshotEngine, VcsError, VersionControl,
};
use walkdir::WalkDir;

// ============================================================================
// TestEngine
// ============================================================================

/// Engine over a throwaway working tree and snapshot directory
pub struct TestEngine {
    pub engine: SnapshotEngine,
    pub dir: TempDir,
}

impl TestEngine {
    /// Engine with the default retention cap
    pub fn new() -> Self {
        Self::with_max_snapshots(5)
    }

    pub fn with_max_snapshots(max: usize) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let engine = SnapshotEngine::open(config_for(dir.path()).with_max_snapshots(max))
            .expect("Failed to open engine");
        TestEngine { engine, dir }
    }

    pub fn with_vcs(vcs: RecordingVcs) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let engine = SnapshotEngine::open(config_for(dir.path()))
            .expect("Failed to open engine")
            .with_vcs(Box::new(vcs));
        TestEngine { engine, dir }
    }

    /// Engine whose snapshot directory sits inside the working tree
    /// (`proj/.treesnap/snapshots`), the layout the default config produces
    pub fn nested() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let engine =
            SnapshotEngine::open(nested_config_for(dir.path())).expect("Failed to open engine");
        TestEngine { engine, dir }
    }

    /// Second engine over the same directories, with fresh state
    pub fn reopen(&self, max: usize) -> SnapshotEngine {
        SnapshotEngine::open(config_for(self.dir.path()).with_max_snapshots(max))
            .expect("Failed to reopen engine")
    }

    pub fn repo(&self) -> &Path {
        self.engine.paths().repo()
    }

    pub fn snapshot_dir(&self) -> &Path {
        self.engine.paths().snapshot_dir()
    }

    pub fn write(&self, relative: &str, data: &[u8]) {
        write_file(self.repo(), relative, data);
    }

    pub fn read(&self, relative: &str) -> Vec<u8> {
        fs::read(self.repo().join(relative)).expect("Failed to read working tree file")
    }

    /// Names in the snapshot directory
    pub fn snapshot_dir_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.snapshot_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn config_for(root: &Path) -> SnapshotConfig {
    SnapshotConfig::new(root.join("repo"), root.join("state/snapshots"))
}

pub fn nested_config_for(root: &Path) -> SnapshotConfig {
    let repo = root.join("proj");
    SnapshotConfig::new(repo.clone(), repo.join(".treesnap/snapshots"))
}

// ============================================================================
// Filesystem helpers
// ============================================================================

pub fn write_file(root: &Path, relative: &str, data: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, data).unwrap();
}

/// Relative path -> bytes for every file under `root`, skipping `.git`
pub fn tree_contents(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut contents = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.unwrap();
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/");
        if relative == ".git" || relative.starts_with(".git/") {
            continue;
        }
        if entry.file_type().is_file() {
            contents.insert(relative, fs::read(entry.path()).unwrap());
        }
    }
    contents
}

pub fn set_mtime(path: &Path, unix_secs: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0)).unwrap();
}

/// Gzip tar with entry names written verbatim into the header
pub fn write_raw_archive(path: &Path, entries: &[(String, Vec<u8>)]) {
    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in entries {
        let mut header = Header::new_gnu();
        let bytes = name.as_bytes();
        header.as_old_mut().name[..bytes.len()].copy_from_slice(bytes);
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        builder.append(&header, data.as_slice()).unwrap();
    }
    let bytes = builder.into_inner().unwrap().finish().unwrap();
    fs::write(path, bytes).unwrap();
}

pub fn metadata_json(tag: &str) -> Vec<u8> {
    format!(
        "{{\"timestamp\":\"2024-01-01T00:00:00+00:00\",\"tag\":\"{}\",\"description\":\"\",\
         \"repo_path\":\"/r\",\"system\":{{\"runtime_version\":\"v\",\"platform\":\"p\"}}}}",
        tag
    )
    .into_bytes()
}

pub fn snapshot_paths(engine: &SnapshotEngine) -> Vec<PathBuf> {
    engine.list().unwrap().into_iter().map(|s| s.path).collect()
}

// ============================================================================
// RecordingVcs
// ============================================================================

/// A call the engine made on the collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Tag { name: String, annotation: String },
    Commit { message: String },
}

/// Version-control double that records calls and answers from fixed settings
#[derive(Clone)]
pub struct RecordingVcs {
    pub calls: Arc<Mutex<Vec<VcsCall>>>,
    pub succeed: bool,
    pub status_available: bool,
}

impl RecordingVcs {
    pub fn new() -> Self {
        RecordingVcs {
            calls: Arc::new(Mutex::new(Vec::new())),
            succeed: true,
            status_available: true,
        }
    }

    pub fn failing() -> Self {
        RecordingVcs {
            succeed: false,
            status_available: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().clone()
    }
}

impl VersionControl for RecordingVcs {
    fn create_tag(&self, name: &str, annotation: &str) -> bool {
        self.calls.lock().push(VcsCall::Tag {
            name: name.to_string(),
            annotation: annotation.to_string(),
        });
        self.succeed
    }

    fn commit_all(&self, message: &str) -> bool {
        self.calls.lock().push(VcsCall::Commit {
            message: message.to_string(),
        });
        self.succeed
    }

    fn status(&self) -> Result<RepositoryStatus, VcsError> {
        if !self.status_available {
            return Err(VcsError("not a repository".to_string()));
        }
        Ok(RepositoryStatus {
            branch: Some("main".to_string()),
            last_commit: Some(CommitInfo {
                hash: "4f2a9c0".to_string(),
                message: Some("initial".to_string()),
            }),
        })
    }
}
