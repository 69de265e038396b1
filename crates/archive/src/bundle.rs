//! Retention bundle writer
//!
//! Packs a set of snapshot archives into one `.tar.gz` so they can be moved
//! out of the active snapshot directory. Members are stored flat under their
//! file names. The bundle is written to a temporary sibling, checked, and
//! renamed into place; callers only delete the originals once
//! [`BundleWriter::write`] has returned `Ok`.

use crate::error::{ArchiveError, ArchiveResult};
use crate::reader::ArchiveReader;
use crate::types::{temp_path_for, BundleInfo};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use tracing::debug;
use treesnap_core::Limits;

/// Gzip level for bundles; members are already compressed
const BUNDLE_COMPRESSION_LEVEL: u32 = 6;

/// Writer for retention bundles
#[derive(Debug, Default)]
pub struct BundleWriter;

impl BundleWriter {
    /// Write `members` into a bundle at `path`
    ///
    /// Nothing is left at `path` (or its temporary sibling) on failure.
    pub fn write(&self, members: &[PathBuf], path: &Path) -> ArchiveResult<BundleInfo> {
        let temp_path = temp_path_for(path);

        let names = match self.write_inner(members, &temp_path) {
            Ok(names) => names,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        // Bundles hold several snapshots, so only the structure is checked here.
        let reader = ArchiveReader::new(Limits::default().with_max_uncompressed_bytes(u64::MAX));
        if let Err(e) = reader.inspect(&temp_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(ArchiveError::packing(format!(
                "bundle failed validation: {}",
                e
            )));
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        let size_bytes = fs::metadata(path)?.len();
        debug!(
            target: "treesnap::retention",
            path = %path.display(),
            members = names.len(),
            size_bytes,
            "Bundle written"
        );

        Ok(BundleInfo {
            path: path.to_path_buf(),
            members: names,
            size_bytes,
        })
    }

    fn write_inner(&self, members: &[PathBuf], path: &Path) -> ArchiveResult<Vec<String>> {
        let file = File::create(path)?;
        let encoder = GzEncoder::new(
            BufWriter::new(file),
            Compression::new(BUNDLE_COMPRESSION_LEVEL),
        );
        let mut builder = Builder::new(encoder);
        let mut names = Vec::with_capacity(members.len());

        for member in members {
            let name = member
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    ArchiveError::packing(format!("{} has no file name", member.display()))
                })?;

            let file = File::open(member)?;
            let size = file.metadata()?.len();

            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(size);
            header.set_mode(0o644);
            header.set_mtime(0);
            builder
                .append_data(&mut header, &name, file)
                .map_err(|e| ArchiveError::packing(format!("append '{}': {}", name, e)))?;
            names.push(name);
        }

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

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_bundle_members() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.tar.gz");
        let b = dir.path().join("b.tar.gz");
        fs::write(&a, b"first").unwrap();
        fs::write(&b, b"second").unwrap();
        let dest = dir.path().join("bundle.tar.gz");

        let info = BundleWriter::default()
            .write(&[a.clone(), b.clone()], &dest)
            .unwrap();

        assert_eq!(info.members, vec!["a.tar.gz", "b.tar.gz"]);
        assert!(dest.exists());
        assert!(!temp_path_for(&dest).exists());

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
        let mut contents = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let mut data = String::new();
            entry.read_to_string(&mut data).unwrap();
            contents.push(data);
        }
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn test_missing_member_leaves_nothing() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.tar.gz");
        fs::write(&a, b"first").unwrap();
        let dest = dir.path().join("bundle.tar.gz");

        let result = BundleWriter::default().write(&[a, dir.path().join("gone.tar.gz")], &dest);

        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!temp_path_for(&dest).exists());
    }
}
