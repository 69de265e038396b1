//! File naming conventions
//!
//! ```text
//! <snapshot_dir>/
//! ├── <prefix>_snapshot_<tag>_<YYYYMMDD_HHMMSS>.tar.gz   # snapshots
//! ├── pre_restore_backup_<YYYYMMDDHHMMSS>/              # restore backups
//! └── restore_<YYYYMMDDHHMMSS>*/                        # transient extraction
//! <snapshot_dir>/../archive/
//! └── <prefix>_snapshots_archive_<YYYYMMDD>.tar.gz       # retention bundles
//! ```

use crate::tag::SnapshotTag;
use chrono::{DateTime, NaiveDateTime, TimeZone};

/// Extension shared by snapshot archives and retention bundles
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Root subtree inside a snapshot archive holding the working tree copy
pub const REPO_ROOT: &str = "repo";

const SNAPSHOT_MARKER: &str = "_snapshot_";
const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const SNAPSHOT_TIMESTAMP_LEN: usize = 15;

/// `YYYYMMDD_HHMMSS`, used in snapshot file names and version-control tags
pub fn snapshot_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(SNAPSHOT_TIMESTAMP_FORMAT).to_string()
}

/// `YYYYMMDDHHMMSS`, used for backup and extraction directory names
pub fn compact_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y%m%d%H%M%S").to_string()
}

/// `YYYYMMDD`, used for retention bundle names
pub fn date_stamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y%m%d").to_string()
}

/// Version-control tag recorded for a snapshot: `snapshot-<tag>-<timestamp>`
pub fn vcs_tag_name(tag: &SnapshotTag, timestamp: &str) -> String {
    format!("snapshot-{}-{}", tag, timestamp)
}

/// Retention bundle file name: `<prefix>_snapshots_archive_<YYYYMMDD>.tar.gz`
pub fn bundle_file_name(prefix: &str, date: &str) -> String {
    format!("{}_snapshots_archive_{}.{}", prefix, date, ARCHIVE_EXTENSION)
}

/// Parsed snapshot file name
///
/// Names are derived deterministically from prefix, tag, and a second-resolution
/// timestamp; two snapshots with the same tag in the same second share a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    /// Deployment-specific prefix (e.g. "treesnap")
    pub prefix: String,
    /// Validated snapshot tag
    pub tag: SnapshotTag,
    /// `YYYYMMDD_HHMMSS`
    pub timestamp: String,
}

impl SnapshotName {
    /// Build a name for a snapshot taken at `at`
    pub fn new<Tz: TimeZone>(prefix: impl Into<String>, tag: SnapshotTag, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        SnapshotName {
            prefix: prefix.into(),
            tag,
            timestamp: snapshot_timestamp(at),
        }
    }

    /// Full file name including extension
    pub fn file_name(&self) -> String {
        format!(
            "{}{}{}_{}.{}",
            self.prefix, SNAPSHOT_MARKER, self.tag, self.timestamp, ARCHIVE_EXTENSION
        )
    }

    /// Parse a file name produced by [`SnapshotName::file_name`]
    ///
    /// Returns `None` for anything that is not a well-formed snapshot name for
    /// the given prefix, including temporary `.tmp` files.
    pub fn parse(file_name: &str, prefix: &str) -> Option<Self> {
        let rest = file_name
            .strip_prefix(prefix)?
            .strip_prefix(SNAPSHOT_MARKER)?
            .strip_suffix(ARCHIVE_EXTENSION)?
            .strip_suffix('.')?;

        // `<tag>_<YYYYMMDD_HHMMSS>`; tags may themselves contain underscores
        if rest.len() < SNAPSHOT_TIMESTAMP_LEN + 2
            || !rest.is_char_boundary(rest.len() - SNAPSHOT_TIMESTAMP_LEN)
        {
            return None;
        }
        let (head, timestamp) = rest.split_at(rest.len() - SNAPSHOT_TIMESTAMP_LEN);
        let tag = head.strip_suffix('_')?;

        NaiveDateTime::parse_from_str(timestamp, SNAPSHOT_TIMESTAMP_FORMAT).ok()?;
        let tag = SnapshotTag::new(tag).ok()?;

        Some(SnapshotName {
            prefix: prefix.to_string(),
            tag,
            timestamp: timestamp.to_string(),
        })
    }
}

impl std::fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_name())
    }
}
