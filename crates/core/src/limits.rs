//! Safety limits
//!
//! Archives are untrusted input once they sit on disk: anything could have
//! replaced or damaged them. These ceilings bound what the validator accepts.

/// Default ceiling on the cumulative uncompressed size of an archive (500 MiB)
pub const DEFAULT_MAX_UNCOMPRESSED_BYTES: u64 = 500 * 1024 * 1024;

/// Default retention cap
pub const DEFAULT_MAX_SNAPSHOTS: usize = 5;

/// Limits applied when validating archives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum cumulative declared uncompressed entry size in bytes
    pub max_uncompressed_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_uncompressed_bytes: DEFAULT_MAX_UNCOMPRESSED_BYTES,
        }
    }
}

impl Limits {
    /// Set the uncompressed size ceiling
    pub fn with_max_uncompressed_bytes(mut self, bytes: u64) -> Self {
        self.max_uncompressed_bytes = bytes;
        self
    }

    /// Whether a running total is still within the ceiling
    pub fn within_size(&self, total: u64) -> bool {
        total <= self.max_uncompressed_bytes
    }
}
