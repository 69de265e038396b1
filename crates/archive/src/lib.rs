//! Snapshot archive format
//!
//! Snapshots are gzip-compressed tar archives (`.tar.gz`):
//!
//! ```text
//! treesnap_snapshot_<tag>_<YYYYMMDD_HHMMSS>.tar.gz
//! ├── repo/  # filtered copy of the working tree
//! │   └── ...
//! └── .treesnap_meta.json  # metadata record (tag, description, timestamps, host)
//! ```
//!
//! ## Design Principles
//!
//! - **Validated before trusted**: every archive passes [`ArchiveReader`]
//!   checks before it is published, listed, or restored
//! - **Atomic install**: archives are written to a sibling `.tmp` path and
//!   renamed into place, so the final path is never half-written
//! - **Inspectable**: standard tools (`tar`, `jq`) can read the contents
//! - **Reproducible entries**: zero mtime/uid/gid and normalized modes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundle;
pub mod error;
pub mod reader;
pub mod types;
pub mod writer;

pub use bundle::BundleWriter;
pub use error::{ArchiveError, ArchiveResult};
pub use reader::ArchiveReader;
pub use types::{temp_path_for, ArchiveInfo, ArchiveStats, BundleInfo, PackOptions};
pub use writer::ArchiveWriter;
