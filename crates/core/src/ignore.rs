//! Ignore rules for snapshot staging
//!
//! Decides which entries of the working tree are copied into a snapshot.
//! Patterns are globs matched against individual path component names, so
//! an ignored directory drops its whole subtree:
//!
//! ```text
//! .git/HEAD            -> ignored (component ".git")
//! pkg/__pycache__/x    -> ignored (component "__pycache__")
//! pkg/mod.pyc          -> ignored ("*.pyc")
//! pkg/mod.py           -> copied
//! ```
//!
//! [`filter_tree`] is pure: it works on a listing, not the filesystem, so the
//! rule logic can be tested without touching disk.

use crate::error::IgnoreError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};

/// Patterns always applied when staging a snapshot
///
/// Version-control metadata, byte-compiled caches, editor swap/backup files,
/// and OS metadata files.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "__pycache__",
    "*.pyc",
    ".ipynb_checkpoints",
    ".tmp",
    "*.tmp",
    ".swp",
    "*.swp",
    "*.bak",
    "*~",
    ".DS_Store",
];

/// Kind of a listed tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Dir,
    /// Symbolic link (resolved by the copier)
    Symlink,
    /// Socket, FIFO, device: never copied
    Other,
}

/// One entry of a tree listing, relative to the tree root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path relative to the tree root
    pub path: PathBuf,
    /// Entry kind
    pub kind: EntryKind,
}

impl TreeEntry {
    /// Create a listing entry
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        TreeEntry {
            path: path.into(),
            kind,
        }
    }
}

/// Compiled ignore rule set
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnoreRules {
    /// Compile a rule set from glob patterns
    pub fn new<I, S>(patterns: I) -> Result<Self, IgnoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|e| IgnoreError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }
        let set = builder.build().map_err(|e| IgnoreError::InvalidPattern {
            pattern: kept.join(","),
            reason: e.to_string(),
        })?;
        Ok(IgnoreRules {
            patterns: kept,
            set,
        })
    }

    /// The default rule set plus `extra` patterns
    pub fn with_defaults<I, S>(extra: I) -> Result<Self, IgnoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra: Vec<String> = extra.into_iter().map(|p| p.as_ref().to_string()).collect();
        Self::new(
            DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .chain(extra),
        )
    }

    /// Patterns this set was compiled from
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a single file or directory name is ignored
    pub fn is_ignored_name(&self, name: &str) -> bool {
        self.set.is_match(name)
    }

    /// Whether a relative path is ignored
    ///
    /// True if any component is ignored, or if the path is not a plain
    /// relative path (absolute, or containing `..`).
    pub fn is_ignored(&self, path: &Path) -> bool {
        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    if self.is_ignored_name(&name.to_string_lossy()) {
                        return true;
                    }
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return true,
            }
        }
        false
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        match Self::new(DEFAULT_IGNORE_PATTERNS) {
            Ok(rules) => rules,
            Err(e) => {
                debug_assert!(false, "built-in ignore patterns must compile: {}", e);
                IgnoreRules {
                    patterns: Vec::new(),
                    set: GlobSet::empty(),
                }
            }
        }
    }
}

/// Select the entries of a tree listing that should be copied
///
/// Listing order is preserved. Entries of kind [`EntryKind::Other`] are never
/// selected.
pub fn filter_tree(listing: &[TreeEntry], rules: &IgnoreRules) -> Vec<PathBuf> {
    listing
        .iter()
        .filter(|entry| entry.kind != EntryKind::Other)
        .filter(|entry| !entry.path.as_os_str().is_empty())
        .filter(|entry| !rules.is_ignored(&entry.path))
        .map(|entry| entry.path.clone())
        .collect()
}
