//! Archive core types

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use treesnap_core::Limits;

/// Options controlling how archives are packed and checked
#[derive(Debug, Clone, Copy)]
pub struct PackOptions {
    /// gzip level, 0-9 (default: 6)
    pub compression_level: u32,
    /// Limits the validator enforces on the packed result
    pub limits: Limits,
}

impl Default for PackOptions {
    fn default() -> Self {
        PackOptions {
            compression_level: 6,
            limits: Limits::default(),
        }
    }
}

impl PackOptions {
    /// Set the validation limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the gzip level (clamped to 9)
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}

/// What the validator saw while walking an archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Total entries (files and directories)
    pub entry_count: usize,
    /// Regular file entries
    pub file_count: usize,
    /// Sum of declared uncompressed entry sizes
    pub uncompressed_bytes: u64,
    /// Whether the reserved metadata entry is present
    pub has_metadata: bool,
}

/// Information about an installed snapshot archive
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    /// Final path of the archive
    pub path: PathBuf,
    /// Compressed size on disk
    pub size_bytes: u64,
    /// Entries written (including directories and metadata)
    pub entry_count: usize,
    /// Sum of uncompressed entry sizes
    pub uncompressed_bytes: u64,
}

/// Information about a written retention bundle
#[derive(Debug, Clone)]
pub struct BundleInfo {
    /// Final path of the bundle
    pub path: PathBuf,
    /// Member file names, in bundle order
    pub members: Vec<String>,
    /// Compressed size on disk
    pub size_bytes: u64,
}

/// Sibling temporary path used while an archive is being written
///
/// `a.tar.gz` becomes `a.tar.gz.tmp`: same directory, so the final rename
/// never crosses a filesystem.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_is_sibling() {
        let path = Path::new("/snaps/treesnap_snapshot_a_20240101_000000.tar.gz");
        let temp = temp_path_for(path);
        assert_eq!(temp.parent(), path.parent());
        assert_eq!(
            temp.file_name().unwrap(),
            "treesnap_snapshot_a_20240101_000000.tar.gz.tmp"
        );
    }

    #[test]
    fn test_compression_level_clamped() {
        let options = PackOptions::default().with_compression_level(42);
        assert_eq!(options.compression_level, 9);
    }
}
