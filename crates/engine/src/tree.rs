//! Working-tree I/O
//!
//! Copying comes in two policies:
//!
//! - strict ([`stage_tree`], [`backup_tree`]): the first failing entry aborts
//!   the whole copy; the caller discards the partial destination
//! - best effort ([`copy_best_effort`], [`clear_tree`]): failing entries are
//!   logged, skipped, and returned as [`EntryFailure`]s
//!
//! The reserved version-control subtree ([`RESERVED_SUBTREE`]) and any
//! engine-owned directory nested in the working tree ([`ProtectedPaths`]) are
//! never staged, backed up, cleared, or overwritten.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use treesnap_core::{filter_tree, EntryFailure, EntryKind, IgnoreRules, TreeEntry};
use walkdir::WalkDir;

/// Top-level directory that clear, backup, and install leave alone
pub const RESERVED_SUBTREE: &str = ".git";

/// Whether a relative path lies in the reserved subtree
pub fn is_reserved(relative: &Path) -> bool {
    matches!(
        relative.components().next(),
        Some(Component::Normal(name)) if name == RESERVED_SUBTREE
    )
}

/// Subtrees of a working tree that tree operations must not touch
///
/// Holds the reserved subtree implicitly plus the working-tree-relative
/// paths of engine directories (snapshot directory, bundle directory) that
/// were configured inside the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedPaths {
    relative: Vec<PathBuf>,
}

impl ProtectedPaths {
    /// Only the reserved subtree
    pub fn none() -> Self {
        Self::default()
    }

    /// Protect each of `dirs` that lies strictly inside `root`
    ///
    /// Both `root` and `dirs` must be absolute and normalized.
    pub fn within(root: &Path, dirs: &[&Path]) -> Self {
        let mut relative: Vec<PathBuf> = dirs
            .iter()
            .filter_map(|dir| dir.strip_prefix(root).ok())
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect();
        relative.sort();
        relative.dedup();
        ProtectedPaths { relative }
    }

    /// Protected working-tree-relative paths, besides the reserved subtree
    pub fn paths(&self) -> &[PathBuf] {
        &self.relative
    }

    /// Whether `relative` is in the reserved subtree or a protected directory
    pub fn contains(&self, relative: &Path) -> bool {
        is_reserved(relative) || self.relative.iter().any(|p| relative.starts_with(p))
    }

    /// Whether a protected directory lies strictly below `relative`
    fn encloses(&self, relative: &Path) -> bool {
        self.relative
            .iter()
            .any(|p| p.as_path() != relative && p.starts_with(relative))
    }
}

/// List every entry under `root`, depth first, sorted by name at each level
///
/// With `follow_links`, symlinks are resolved and reported as what they point
/// to; dangling links are skipped. Protected subtrees are not descended into
/// and not listed.
pub fn list_tree(
    root: &Path,
    follow_links: bool,
    protected: &ProtectedPaths,
) -> io::Result<Vec<TreeEntry>> {
    let mut listing = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| match e.path().strip_prefix(root) {
            Ok(relative) => !protected.contains(relative),
            Err(_) => true,
        });
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if let Some(path) = dangling_link(&e) {
                    debug!(
                        target: "treesnap::tree",
                        path = %path.display(),
                        "Skipping dangling symlink"
                    );
                    continue;
                }
                return Err(e.into());
            }
        };

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        };
        listing.push(TreeEntry::new(relative, kind));
    }
    Ok(listing)
}

fn dangling_link(e: &walkdir::Error) -> Option<&Path> {
    let path = e.path()?;
    let not_found = e
        .io_error()
        .map(|io| io.kind() == io::ErrorKind::NotFound)
        .unwrap_or(false);
    let is_link = fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    (not_found && is_link).then_some(path)
}

/// Copy the filtered working tree into `dest` (strict)
///
/// A missing `source` stages nothing. Symlinks are followed, so the stage
/// holds only regular files and directories. Returns the number of entries
/// copied.
pub fn stage_tree(
    source: &Path,
    dest: &Path,
    rules: &IgnoreRules,
    protected: &ProtectedPaths,
) -> io::Result<usize> {
    fs::create_dir_all(dest)?;
    if !source.exists() {
        debug!(
            target: "treesnap::tree",
            path = %source.display(),
            "Working tree missing, staging empty tree"
        );
        return Ok(0);
    }

    let listing = list_tree(source, true, protected)?;
    let selected = filter_tree(&listing, rules);
    for relative in &selected {
        copy_entry(&source.join(relative), &dest.join(relative))
            .map_err(|e| with_path(e, relative))?;
    }
    Ok(selected.len())
}

/// Copy the working tree, minus protected subtrees, into `dest` (strict)
///
/// Symlinks are preserved as links where the platform allows it.
pub fn backup_tree(source: &Path, dest: &Path, protected: &ProtectedPaths) -> io::Result<usize> {
    fs::create_dir_all(dest)?;
    if !source.exists() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in list_tree(source, false, protected)? {
        if entry.kind == EntryKind::Other {
            continue;
        }
        copy_listed(source, dest, &entry).map_err(|e| with_path(e, &entry.path))?;
        copied += 1;
    }
    Ok(copied)
}

/// Copy every entry of `source` into `dest`, overwriting (best effort)
///
/// Entries whose relative path is protected are neither read nor written.
/// Fails as a whole only when `source` cannot be enumerated or `dest` cannot
/// be created.
pub fn copy_best_effort(
    source: &Path,
    dest: &Path,
    protected: &ProtectedPaths,
) -> io::Result<Vec<EntryFailure>> {
    fs::create_dir_all(dest)?;
    let mut failures = Vec::new();

    for entry in list_tree(source, false, protected)? {
        if entry.kind == EntryKind::Other {
            continue;
        }
        if let Err(e) = copy_listed(source, dest, &entry) {
            let target = dest.join(&entry.path);
            warn!(
                target: "treesnap::tree",
                path = %target.display(),
                error = %e,
                "Failed to copy entry, skipping"
            );
            failures.push(EntryFailure::new(target, e));
        }
    }
    Ok(failures)
}

/// Remove everything under `root` except protected subtrees (best effort)
///
/// Directories that contain a protected subtree are emptied around it
/// rather than removed. Fails as a whole only when `root` cannot be read.
pub fn clear_tree(root: &Path, protected: &ProtectedPaths) -> io::Result<Vec<EntryFailure>> {
    let mut failures = Vec::new();
    if !root.exists() {
        return Ok(failures);
    }
    clear_dir(root, Path::new(""), protected, &mut failures)?;
    Ok(failures)
}

fn clear_dir(
    root: &Path,
    relative_dir: &Path,
    protected: &ProtectedPaths,
    failures: &mut Vec<EntryFailure>,
) -> io::Result<()> {
    let dir = root.join(relative_dir);
    for entry in fs::read_dir(&dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(target: "treesnap::tree", dir = %dir.display(), error = %e, "Unreadable directory entry");
                failures.push(EntryFailure::new(&dir, e));
                continue;
            }
        };
        let relative = relative_dir.join(entry.file_name());
        if protected.contains(&relative) {
            continue;
        }

        let path = entry.path();
        let result = match entry.file_type() {
            Ok(file_type) if file_type.is_dir() && protected.encloses(&relative) => {
                clear_dir(root, &relative, protected, failures)
            }
            Ok(file_type) if file_type.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(
                target: "treesnap::tree",
                path = %path.display(),
                error = %e,
                "Failed to remove entry, skipping"
            );
            failures.push(EntryFailure::new(path, e));
        }
    }
    Ok(())
}

/// Make a staged tree portable: directories 0755, files 0644
#[cfg(unix)]
pub fn normalize_permissions(root: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        let file_type = entry.file_type();
        let mode = if file_type.is_dir() {
            0o755
        } else if file_type.is_file() {
            0o644
        } else {
            continue;
        };
        fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

/// Make a staged tree portable (no-op where modes do not apply)
#[cfg(not(unix))]
pub fn normalize_permissions(_root: &Path) -> io::Result<()> {
    Ok(())
}

/// SHA-256 over the bytes of every regular file under `root`
///
/// Files are visited depth first in file-name order at each level. Paths and
/// directory structure do not contribute, so the digest depends only on file
/// contents and their order.
pub fn hash_tree(root: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut hasher)?;
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn copy_listed(source: &Path, dest: &Path, entry: &TreeEntry) -> io::Result<()> {
    let from = source.join(&entry.path);
    let to = dest.join(&entry.path);
    match entry.kind {
        EntryKind::Symlink => copy_symlink(&from, &to),
        _ => copy_entry(&from, &to),
    }
}

/// Copy one file or create one directory, following symlinks
fn copy_entry(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::metadata(from)?;
    if metadata.is_dir() {
        return fs::create_dir_all(to);
    }
    if !metadata.is_file() {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::symlink_metadata(to)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
    {
        fs::remove_file(to)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::symlink_metadata(to).is_ok() {
        fs::remove_file(to)?;
    }
    std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    copy_entry(from, to)
}

fn with_path(e: io::Error, relative: &Path) -> io::Error {
    io::Error::new(e.kind(), format!("{}: {}", relative.display(), e))
}
