//! Version-control collaborator
//!
//! The engine reports snapshot and restore events to an optional
//! [`VersionControl`] implementation. Every call is best effort: a `false`
//! return or an error is logged and never changes the outcome of the
//! operation that triggered it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error querying repository status
#[derive(Debug, Error)]
#[error("version control unavailable: {0}")]
pub struct VcsError(pub String);

/// A commit as reported by the collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Commit identifier
    pub hash: String,
    /// Commit subject line, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Current position of the managed repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStatus {
    /// Active branch, if any
    pub branch: Option<String>,
    /// Most recent commit, if any
    pub last_commit: Option<CommitInfo>,
}

/// Version-control collaborator
pub trait VersionControl: Send + Sync {
    /// Create an annotated tag; returns whether it succeeded
    fn create_tag(&self, name: &str, annotation: &str) -> bool;

    /// Stage and commit everything; returns whether it succeeded
    fn commit_all(&self, message: &str) -> bool;

    /// Current branch and last commit
    fn status(&self) -> Result<RepositoryStatus, VcsError>;
}
