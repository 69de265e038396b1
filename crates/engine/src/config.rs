//! Engine configuration via `treesnap.toml`
//!
//! Every key is optional; a missing key takes its default. `init-config`
//! writes the commented default file shown by [`SnapshotConfig::default_toml`].

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use treesnap_core::{Limits, SnapshotTag, DEFAULT_MAX_SNAPSHOTS, DEFAULT_MAX_UNCOMPRESSED_BYTES};

/// Config file name looked up in the current directory
pub const CONFIG_FILE_NAME: &str = "treesnap.toml";

/// Default snapshot directory, relative to the current directory
pub const DEFAULT_SNAPSHOT_DIR: &str = ".treesnap/snapshots";

/// Default file name prefix
pub const DEFAULT_PREFIX: &str = "treesnap";

/// Engine configuration loaded from `treesnap.toml`
///
/// # Example
///
/// ```toml
/// repo_path = "."
/// snapshot_dir = ".treesnap/snapshots"
/// max_snapshots = 5
/// ignore = ["target", "*.log"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Managed working tree
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,
    /// Directory holding snapshot archives
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
    /// Retention cap (values below 1 are treated as 1)
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,
    /// File name prefix for snapshots and bundles
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Extra ignore globs on top of the built-in set
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Whether restore validates the snapshot first
    #[serde(default = "default_verify_on_restore")]
    pub verify_on_restore: bool,
    /// Validator ceiling on cumulative uncompressed size
    #[serde(default = "default_max_uncompressed_bytes")]
    pub max_uncompressed_bytes: u64,
}

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_DIR)
}

fn default_max_snapshots() -> usize {
    DEFAULT_MAX_SNAPSHOTS
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_verify_on_restore() -> bool {
    true
}

fn default_max_uncompressed_bytes() -> u64 {
    DEFAULT_MAX_UNCOMPRESSED_BYTES
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            snapshot_dir: default_snapshot_dir(),
            max_snapshots: default_max_snapshots(),
            prefix: default_prefix(),
            ignore: Vec::new(),
            verify_on_restore: default_verify_on_restore(),
            max_uncompressed_bytes: default_max_uncompressed_bytes(),
        }
    }
}

impl SnapshotConfig {
    /// Config for a working tree and snapshot directory, other keys default
    pub fn new(repo_path: impl Into<PathBuf>, snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            snapshot_dir: snapshot_dir.into(),
            ..Self::default()
        }
    }

    /// Set the retention cap
    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max;
        self
    }

    /// Set the file name prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Add extra ignore globs
    pub fn with_ignore<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Set the validator size ceiling
    pub fn with_max_uncompressed_bytes(mut self, bytes: u64) -> Self {
        self.max_uncompressed_bytes = bytes;
        self
    }

    /// Effective retention cap, never below 1
    pub fn retention_cap(&self) -> usize {
        self.max_snapshots.max(1)
    }

    /// Validator limits derived from this config
    pub fn limits(&self) -> Limits {
        Limits::default().with_max_uncompressed_bytes(self.max_uncompressed_bytes)
    }

    /// Check values that cannot be expressed in the schema
    ///
    /// The prefix ends up in file names, so it follows the tag alphabet.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SnapshotTag::validate(&self.prefix).map_err(|e| ConfigError::InvalidValue {
            key: "prefix",
            reason: e.to_string(),
        })?;
        if self.max_uncompressed_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_uncompressed_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# treesnap configuration
#
# Working tree to snapshot and restore
repo_path = "."

# Where snapshot archives are kept (created with owner-only permissions).
# Retention bundles go to a sibling "archive" directory.
snapshot_dir = ".treesnap/snapshots"

# Number of snapshots kept; older ones are deleted after each create
max_snapshots = 5

# File name prefix: <prefix>_snapshot_<tag>_<YYYYMMDD_HHMMSS>.tar.gz
prefix = "treesnap"

# Extra glob patterns to leave out of snapshots, matched against each
# file or directory name. Always ignored: .git, __pycache__, *.pyc,
# .ipynb_checkpoints, *.tmp, *.swp, *.bak, *~, .DS_Store
ignore = []

# Validate a snapshot before restoring it
verify_on_restore = true

# Reject archives whose entries add up to more than this many bytes
max_uncompressed_bytes = 524288000
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SnapshotConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `true` if a file was created.
    pub fn write_default_if_missing(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_toml_matches_defaults() {
        let config: SnapshotConfig = toml::from_str(SnapshotConfig::default_toml()).unwrap();
        assert_eq!(config, SnapshotConfig::default());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();

        let config = SnapshotConfig::from_file(&path).unwrap();
        assert_eq!(config.max_snapshots, 5);
        assert_eq!(config.prefix, "treesnap");
        assert!(config.verify_on_restore);
        assert_eq!(config.snapshot_dir, PathBuf::from(".treesnap/snapshots"));
    }

    #[test]
    fn partial_file_overrides() {
        let config: SnapshotConfig = toml::from_str(
            r#"
max_snapshots = 2
ignore = ["target", "*.log"]
verify_on_restore = false
"#,
        )
        .unwrap();
        assert_eq!(config.max_snapshots, 2);
        assert_eq!(config.ignore, vec!["target", "*.log"]);
        assert!(!config.verify_on_restore);
        assert_eq!(config.prefix, "treesnap");
    }

    #[test]
    fn retention_cap_clamped_to_one() {
        let config = SnapshotConfig::default().with_max_snapshots(0);
        assert_eq!(config.retention_cap(), 1);
        assert_eq!(config.with_max_snapshots(3).retention_cap(), 3);
    }

    #[test]
    fn invalid_prefix_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "prefix = \"my snaps\"\n").unwrap();

        let err = SnapshotConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "prefix", .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_snapshots = \"many\"\n").unwrap();

        assert!(matches!(
            SnapshotConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        assert!(SnapshotConfig::write_default_if_missing(&path).unwrap());
        std::fs::write(&path, "max_snapshots = 9\n").unwrap();
        assert!(!SnapshotConfig::write_default_if_missing(&path).unwrap());

        assert_eq!(SnapshotConfig::from_file(&path).unwrap().max_snapshots, 9);
    }
}
