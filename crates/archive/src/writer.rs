//! Snapshot archive writer
//!
//! Packs a staged tree plus its metadata document into a `.tar.gz` with
//! atomic install semantics:
//!
//! 1. Pack into `<final>.tmp` and flush it to disk
//! 2. Validate the temporary archive; on failure delete it
//! 3. Rename into place
//! 4. Re-validate at the final path; on failure delete it
//!
//! An archive at the final path has therefore passed validation twice, and a
//! failed write leaves neither the temporary nor the final file behind.

use crate::error::{ArchiveError, ArchiveResult};
use crate::reader::ArchiveReader;
use crate::types::{temp_path_for, ArchiveInfo, PackOptions};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tar::{Builder, EntryType, Header};
use tracing::{debug, warn};
use treesnap_core::{METADATA_FILE_NAME, REPO_ROOT};
use walkdir::WalkDir;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// Writer for snapshot archives
pub struct ArchiveWriter {
    options: PackOptions,
}

impl ArchiveWriter {
    /// Create a new writer with the given options
    pub fn new(options: PackOptions) -> Self {
        Self { options }
    }

    /// Create a new writer with default options
    pub fn with_defaults() -> Self {
        Self::new(PackOptions::default())
    }

    /// Pack `stage_root` (stored under `repo/`) and `metadata` (stored at the
    /// archive root) into `path`
    ///
    /// # Errors
    ///
    /// - `PackingFailed`: packing or pre-install validation failed; nothing
    ///   exists at `path`
    /// - `InstalledCorrupt`: the renamed archive failed re-validation and was
    ///   removed
    pub fn write(
        &self,
        stage_root: &Path,
        metadata: &[u8],
        path: &Path,
    ) -> ArchiveResult<ArchiveInfo> {
        let temp_path = temp_path_for(path);
        let reader = ArchiveReader::new(self.options.limits);

        let (entry_count, uncompressed_bytes) =
            match self.write_inner(stage_root, metadata, &temp_path) {
                Ok(counts) => counts,
                Err(e) => {
                    let _ = fs::remove_file(&temp_path);
                    return Err(match e {
                        ArchiveError::PackingFailed(_) => e,
                        other => ArchiveError::packing(other.to_string()),
                    });
                }
            };

        if let Err(e) = reader.check_snapshot(&temp_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(ArchiveError::packing(format!(
                "packed archive failed validation: {}",
                e
            )));
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(ArchiveError::packing(format!(
                "install {}: {}",
                path.display(),
                e
            )));
        }
        sync_parent(path);

        if let Err(e) = reader.check_snapshot(path) {
            warn!(
                target: "treesnap::archive",
                path = %path.display(),
                error = %e,
                "Installed archive failed re-validation, removing"
            );
            let _ = fs::remove_file(path);
            return Err(ArchiveError::InstalledCorrupt {
                path: path.to_path_buf(),
            });
        }

        let size_bytes = fs::metadata(path)?.len();
        debug!(
            target: "treesnap::archive",
            path = %path.display(),
            entries = entry_count,
            size_bytes,
            "Archive installed"
        );

        Ok(ArchiveInfo {
            path: path.to_path_buf(),
            size_bytes,
            entry_count,
            uncompressed_bytes,
        })
    }

    /// Pack into `path` without validation; returns (entries, uncompressed bytes)
    fn write_inner(
        &self,
        stage_root: &Path,
        metadata: &[u8],
        path: &Path,
    ) -> ArchiveResult<(usize, u64)> {
        if !stage_root.is_dir() {
            return Err(ArchiveError::packing(format!(
                "staged tree {} is not a directory",
                stage_root.display()
            )));
        }

        let file = File::create(path)?;
        let encoder = GzEncoder::new(
            BufWriter::new(file),
            Compression::new(self.options.compression_level),
        );
        let mut builder = Builder::new(encoder);

        let mut entry_count = 0usize;
        let mut uncompressed = 0u64;

        add_dir(&mut builder, REPO_ROOT)?;
        entry_count += 1;

        for entry in WalkDir::new(stage_root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                ArchiveError::packing(format!("walk {}: {}", stage_root.display(), e))
            })?;
            let relative = entry.path().strip_prefix(stage_root).map_err(|e| {
                ArchiveError::packing(format!("{}: {}", entry.path().display(), e))
            })?;
            let name = archive_name(relative);

            let file_type = entry.file_type();
            if file_type.is_dir() {
                add_dir(&mut builder, &name)?;
            } else if file_type.is_file() {
                let file = File::open(entry.path())?;
                let size = file.metadata()?.len();
                add_file(&mut builder, &name, size, file)?;
                uncompressed = uncompressed.saturating_add(size);
            } else {
                debug!(
                    target: "treesnap::archive",
                    path = %entry.path().display(),
                    "Skipping non-regular staged entry"
                );
                continue;
            }
            entry_count += 1;
        }

        add_file(
            &mut builder,
            METADATA_FILE_NAME,
            metadata.len() as u64,
            metadata,
        )?;
        entry_count += 1;
        uncompressed = uncompressed.saturating_add(metadata.len() as u64);

        let encoder = builder
            .into_inner()
            .map_err(|e| ArchiveError::packing(format!("tar finish: {}", e)))?;
        let buf_writer = encoder
            .finish()
            .map_err(|e| ArchiveError::packing(format!("gzip finish: {}", e)))?;
        let file = buf_writer
            .into_inner()
            .map_err(|e| ArchiveError::packing(format!("flush: {}", e.error())))?;
        file.sync_all()?;

        Ok((entry_count, uncompressed))
    }
}

/// `repo/<relative>` with forward slashes
fn archive_name(relative: &Path) -> String {
    let mut name = String::from(REPO_ROOT);
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}

fn header(entry_type: EntryType, mode: u32, size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_size(size);
    header.set_mtime(0); // Reproducible output: zero mtime and owner
    header.set_uid(0);
    header.set_gid(0);
    header
}

fn add_dir<W: Write>(builder: &mut Builder<W>, name: &str) -> ArchiveResult<()> {
    let mut header = header(EntryType::Directory, DIR_MODE, 0);
    builder
        .append_data(&mut header, name, std::io::empty())
        .map_err(|e| ArchiveError::packing(format!("append '{}': {}", name, e)))
}

fn add_file<W: Write, R: Read>(
    builder: &mut Builder<W>,
    name: &str,
    size: u64,
    data: R,
) -> ArchiveResult<()> {
    let mut header = header(EntryType::Regular, FILE_MODE, size);
    builder
        .append_data(&mut header, name, data.take(size))
        .map_err(|e| ArchiveError::packing(format!("append '{}': {}", name, e)))
}

/// Flush the directory entry of a rename; best effort
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use treesnap_core::Limits;

    fn stage(root: &Path) -> PathBuf {
        let stage = root.join("stage");
        fs::create_dir_all(stage.join("src/nested")).unwrap();
        fs::write(stage.join("README.md"), b"# readme\n").unwrap();
        fs::write(stage.join("src/main.rs"), b"fn main() {}\n").unwrap();
        fs::write(stage.join("src/nested/data.bin"), vec![7u8; 4096]).unwrap();
        fs::create_dir_all(stage.join("empty")).unwrap();
        stage
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|e| {
                String::from_utf8_lossy(&e.unwrap().path_bytes())
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_write_layout() {
        let dir = tempdir().unwrap();
        let stage = stage(dir.path());
        let path = dir.path().join("snap.tar.gz");

        let info = ArchiveWriter::with_defaults()
            .write(&stage, b"{}", &path)
            .unwrap();

        assert_eq!(info.path, path);
        assert!(info.size_bytes > 0);
        assert_eq!(info.uncompressed_bytes, 9 + 13 + 4096 + 2);

        let names = entry_names(&path);
        assert_eq!(names.first().map(String::as_str), Some("repo"));
        assert_eq!(names.last().map(String::as_str), Some(METADATA_FILE_NAME));
        assert!(names.iter().any(|n| n == "repo/src/nested/data.bin"));
        assert!(names.iter().any(|n| n == "repo/empty"));
        assert_eq!(names.len(), info.entry_count);
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let stage = stage(dir.path());
        let path = dir.path().join("snap.tar.gz");

        ArchiveWriter::with_defaults()
            .write(&stage, b"{}", &path)
            .unwrap();
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_headers_are_normalized() {
        let dir = tempdir().unwrap();
        let stage = stage(dir.path());
        let path = dir.path().join("snap.tar.gz");
        ArchiveWriter::with_defaults()
            .write(&stage, b"{}", &path)
            .unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&path).unwrap()));
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let header = entry.header();
            assert_eq!(header.mtime().unwrap(), 0);
            assert_eq!(header.uid().unwrap(), 0);
            let expected = if header.entry_type().is_dir() {
                DIR_MODE
            } else {
                FILE_MODE
            };
            assert_eq!(header.mode().unwrap() & 0o777, expected);
        }
    }

    #[test]
    fn test_identical_trees_pack_identically() {
        let dir = tempdir().unwrap();
        let stage = stage(dir.path());
        let a = dir.path().join("a.tar.gz");
        let b = dir.path().join("b.tar.gz");

        let writer = ArchiveWriter::with_defaults();
        writer.write(&stage, b"{\"x\":1}", &a).unwrap();
        writer.write(&stage, b"{\"x\":1}", &b).unwrap();

        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }

    #[test]
    fn test_oversize_tree_is_not_installed() {
        let dir = tempdir().unwrap();
        let stage = stage(dir.path());
        let path = dir.path().join("snap.tar.gz");

        let writer = ArchiveWriter::new(
            PackOptions::default()
                .with_limits(Limits::default().with_max_uncompressed_bytes(100)),
        );
        let err = writer.write(&stage, b"{}", &path).unwrap_err();

        assert!(matches!(err, ArchiveError::PackingFailed(_)));
        assert!(!path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_missing_stage_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap.tar.gz");

        let err = ArchiveWriter::with_defaults()
            .write(&dir.path().join("nope"), b"{}", &path)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::PackingFailed(_)));
        assert!(!path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_empty_stage_still_has_repo_root() {
        let dir = tempdir().unwrap();
        let stage = dir.path().join("stage");
        fs::create_dir(&stage).unwrap();
        let path = dir.path().join("snap.tar.gz");

        let info = ArchiveWriter::with_defaults()
            .write(&stage, b"{}", &path)
            .unwrap();
        assert_eq!(info.entry_count, 2);
        assert_eq!(entry_names(&path), vec!["repo", METADATA_FILE_NAME]);
    }

    #[test]
    fn test_archive_name_uses_forward_slashes() {
        assert_eq!(archive_name(Path::new("a/b/c.txt")), "repo/a/b/c.txt");
        assert_eq!(archive_name(Path::new("top")), "repo/top");
    }
}
