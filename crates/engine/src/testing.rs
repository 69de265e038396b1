//! Fault injection for the restore protocol
//!
//! Failures that happen after the working tree has been modified are hard
//! to provoke from outside (they need a full disk or a vanished directory at
//! the wrong moment). A [`CrashPoint`] armed with
//! [`SnapshotEngine::with_crash_point`](crate::SnapshotEngine::with_crash_point)
//! makes the named step fail the way the real I/O error would.
//!
//! # Example
//!
//! ```ignore
//! use treesnap_engine::testing::CrashPoint;
//!
//! let engine = SnapshotEngine::open(config)?.with_crash_point(CrashPoint::AfterClear);
//! let outcome = engine.restore(&snapshot, true);
//! assert!(matches!(outcome, RestoreOutcome::FailedRecovered { .. }));
//! ```

use std::fmt;

/// Restore step that fails on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrashPoint {
    /// Install fails after the working tree was cleared
    AfterClear,
    /// Copying the backup back fails after the working tree was cleared
    DuringRecovery,
}

impl fmt::Display for CrashPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashPoint::AfterClear => write!(f, "after-clear"),
            CrashPoint::DuringRecovery => write!(f, "during-recovery"),
        }
    }
}
