//! Snapshot archive reader and validator
//!
//! Every archive is treated as untrusted until it passes [`ArchiveReader::inspect`]:
//!
//! 1. The file is a gzip stream (magic bytes) whose tar entries parse cleanly
//!    to the end, including the gzip trailer CRC
//! 2. No entry name is absolute or contains a `..` segment
//! 3. Only regular files and directories are present (no links or devices)
//! 4. The running total of declared entry sizes stays within
//!    [`Limits::max_uncompressed_bytes`]; the walk stops at the first entry
//!    that crosses it, before that entry's data is read
//!
//! A snapshot additionally has to carry the metadata entry.

use crate::error::{ArchiveError, ArchiveResult};
use crate::types::ArchiveStats;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path};
use tar::{Archive, EntryType};
use tracing::{debug, warn};
use treesnap_core::{Limits, SnapshotMetadata, METADATA_FILE_NAME};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound on the metadata document we are willing to parse
const MAX_METADATA_BYTES: u64 = 1024 * 1024;

/// Reader for snapshot archives
///
/// Stateless apart from the limits it enforces.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveReader {
    limits: Limits,
}

impl ArchiveReader {
    /// Create a reader enforcing `limits`
    pub fn new(limits: Limits) -> Self {
        ArchiveReader { limits }
    }

    /// Limits this reader enforces
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Walk the whole archive, applying every structural and security check
    ///
    /// # Errors
    ///
    /// - `NotCompressed`: not a gzip file
    /// - `Malformed`: tar/gzip stream damaged or truncated
    /// - `UnsafeEntry`: traversal, absolute path, or forbidden entry type
    /// - `SizeLimitExceeded`: declared sizes cross the ceiling
    /// - `Io`: the file could not be opened
    pub fn inspect(&self, path: &Path) -> ArchiveResult<ArchiveStats> {
        let mut archive = open_archive(path)?;
        let mut stats = ArchiveStats::default();

        let entries = archive
            .entries()
            .map_err(|e| ArchiveError::malformed(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::malformed(e.to_string()))?;
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

            check_entry_name(&name)?;

            match entry.header().entry_type() {
                EntryType::Regular | EntryType::Continuous => stats.file_count += 1,
                EntryType::Directory => {}
                EntryType::XGlobalHeader | EntryType::XHeader => continue,
                EntryType::Symlink | EntryType::Link => {
                    return Err(ArchiveError::unsafe_entry(name, "link entries are not allowed"))
                }
                other => {
                    return Err(ArchiveError::unsafe_entry(
                        name,
                        format!("unsupported entry type {:?}", other),
                    ))
                }
            }

            stats.uncompressed_bytes = stats.uncompressed_bytes.saturating_add(entry.size());
            if !self.limits.within_size(stats.uncompressed_bytes) {
                return Err(ArchiveError::SizeLimitExceeded {
                    total: stats.uncompressed_bytes,
                    limit: self.limits.max_uncompressed_bytes,
                });
            }

            if is_metadata_entry(&name) {
                stats.has_metadata = true;
            }
            stats.entry_count += 1;
        }

        // Drain what follows the end-of-archive marker so the gzip trailer
        // (CRC32 + length) is verified.
        let mut rest = archive.into_inner();
        io::copy(&mut rest, &mut io::sink())
            .map_err(|e| ArchiveError::malformed(format!("gzip trailer: {}", e)))?;

        debug!(
            target: "treesnap::archive",
            path = %path.display(),
            entries = stats.entry_count,
            bytes = stats.uncompressed_bytes,
            "Archive inspected"
        );
        Ok(stats)
    }

    /// [`inspect`](Self::inspect) plus the metadata-entry requirement
    pub fn check_snapshot(&self, path: &Path) -> ArchiveResult<ArchiveStats> {
        let stats = self.inspect(path)?;
        if !stats.has_metadata {
            return Err(ArchiveError::missing_entry(METADATA_FILE_NAME));
        }
        Ok(stats)
    }

    /// Boolean view of [`inspect`](Self::inspect); the reason is logged
    pub fn validate_archive(&self, path: &Path) -> bool {
        match self.inspect(path) {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    target: "treesnap::archive",
                    path = %path.display(),
                    error = %e,
                    "Archive failed validation"
                );
                false
            }
        }
    }

    /// Boolean view of [`check_snapshot`](Self::check_snapshot); the reason is logged
    pub fn validate_snapshot(&self, path: &Path) -> bool {
        if !path.is_file() {
            warn!(
                target: "treesnap::archive",
                path = %path.display(),
                "Snapshot file does not exist"
            );
            return false;
        }
        match self.check_snapshot(path) {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    target: "treesnap::archive",
                    path = %path.display(),
                    error = %e,
                    "Snapshot failed validation"
                );
                false
            }
        }
    }

    /// Read and parse the metadata entry
    ///
    /// Does not validate the rest of the archive; callers validate first.
    pub fn read_metadata(&self, path: &Path) -> ArchiveResult<SnapshotMetadata> {
        let mut archive = open_archive(path)?;
        let entries = archive
            .entries()
            .map_err(|e| ArchiveError::malformed(e.to_string()))?;

        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::malformed(e.to_string()))?;
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            if !is_metadata_entry(&name) {
                continue;
            }

            let mut data = Vec::new();
            entry
                .take(MAX_METADATA_BYTES)
                .read_to_end(&mut data)
                .map_err(|e| ArchiveError::malformed(format!("read {}: {}", name, e)))?;
            return Ok(SnapshotMetadata::from_json(&data)?);
        }

        Err(ArchiveError::missing_entry(METADATA_FILE_NAME))
    }

    /// Unpack the whole archive into `dest`
    ///
    /// All-or-nothing from the caller's point of view: any failure is returned
    /// and the caller discards `dest`. Entries get the current time as mtime
    /// and default permissions.
    pub fn extract_to(&self, path: &Path, dest: &Path) -> ArchiveResult<()> {
        let mut archive = open_archive(path)?;
        archive.set_preserve_permissions(false);
        archive.set_preserve_mtime(false);
        archive.set_overwrite(true);
        archive.unpack(dest).map_err(|e| {
            ArchiveError::malformed(format!(
                "extract {} into {}: {}",
                path.display(),
                dest.display(),
                e
            ))
        })?;
        Ok(())
    }
}

fn open_archive(path: &Path) -> ArchiveResult<Archive<GzDecoder<BufReader<File>>>> {
    let mut file = File::open(path)?;

    let mut magic = [0u8; 2];
    if file.read_exact(&mut magic).is_err() || magic != GZIP_MAGIC {
        return Err(ArchiveError::NotCompressed(path.to_path_buf()));
    }
    file.seek(SeekFrom::Start(0))?;

    Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
}

fn is_metadata_entry(name: &str) -> bool {
    name.strip_prefix("./").unwrap_or(name) == METADATA_FILE_NAME
}

/// Reject names that could escape the extraction root
fn check_entry_name(name: &str) -> ArchiveResult<()> {
    if name.is_empty() {
        return Err(ArchiveError::unsafe_entry(name, "empty entry name"));
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(ArchiveError::unsafe_entry(name, "absolute path"));
    }
    if name.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(ArchiveError::unsafe_entry(name, "parent directory traversal"));
    }
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return Err(ArchiveError::unsafe_entry(name, "absolute path"));
    }
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(ArchiveError::unsafe_entry(name, "parent directory traversal"))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::unsafe_entry(name, "absolute path"))
            }
        }
    }
    Ok(())
}
