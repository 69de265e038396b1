//! Report → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): one line per item, aligned for terminals
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use chrono::{DateTime, Local};
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::time::SystemTime;
use treesnap_archive::ArchiveStats;
use treesnap_engine::{ArchiveReport, CleanupReport, CreateReport, RestoreOutcome, SnapshotInfo};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format an error.
pub fn format_error(err: &dyn fmt::Display, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&json!({ "error": err.to_string() })),
        OutputMode::Human => format!("(error) {}", err),
    }
}

/// Format the result of `create`.
pub fn format_create(report: &CreateReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&json!({
            "snapshot": snapshot_json(&report.snapshot),
            "content_hash": report.content_hash,
            "entries_staged": report.entries_staged,
            "vcs_tagged": report.vcs_tagged,
            "cleanup": report.cleanup.as_ref().map(cleanup_json),
        })),
        OutputMode::Human => {
            let mut out = format!(
                "Created {} ({} entries, {})",
                report.snapshot.file_name,
                report.entries_staged,
                human_size(report.snapshot.size_bytes)
            );
            if let Some(cleanup) = &report.cleanup {
                if !cleanup.removed.is_empty() {
                    out.push('\n');
                    out.push_str(&format_cleanup(cleanup, mode));
                }
            }
            out
        }
    }
}

/// Format the snapshot listing.
pub fn format_list(snapshots: &[SnapshotInfo], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&Value::Array(
            snapshots.iter().map(snapshot_json).collect(),
        )),
        OutputMode::Human => {
            if snapshots.is_empty() {
                return "(empty list)".to_string();
            }
            snapshots
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let mut line = format!(
                        "{}) {}  {}  {:>9}  {}",
                        i + 1,
                        local_time(s.modified),
                        s.metadata.tag,
                        human_size(s.size_bytes),
                        s.file_name
                    );
                    if !s.metadata.description.is_empty() {
                        line.push_str(&format!("  \"{}\"", s.metadata.description));
                    }
                    line
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// Format a restore outcome.
pub fn format_restore(outcome: &RestoreOutcome, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&json!({
            "success": outcome.is_success(),
            "outcome": outcome_kind(outcome),
            "backup": outcome.backup().map(path_string),
            "error": outcome.error().map(|e| e.to_string()),
            "warnings": match outcome {
                RestoreOutcome::SuccessWithWarnings { warning, .. } => warning
                    .not_removed
                    .iter()
                    .chain(&warning.not_copied)
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>(),
                _ => Vec::new(),
            },
        })),
        OutputMode::Human => match outcome {
            RestoreOutcome::SuccessWithWarnings { backup, warning } => {
                let mut out = format!("{} (backup: {})", outcome, backup.display());
                for failure in warning.not_removed.iter().chain(&warning.not_copied) {
                    out.push_str(&format!("\n  {}", failure));
                }
                out
            }
            RestoreOutcome::Aborted(_)
            | RestoreOutcome::FailedRecovered { .. }
            | RestoreOutcome::FailedUnrecovered { .. } => format!("(error) {}", outcome),
            RestoreOutcome::Success { backup } => {
                format!("{} (backup: {})", outcome, backup.display())
            }
        },
    }
}

/// Format the result of `cleanup`.
pub fn format_cleanup(report: &CleanupReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&cleanup_json(report)),
        OutputMode::Human => {
            let mut out = format!(
                "Kept {}, removed {}",
                report.kept,
                report.removed.len()
            );
            for path in &report.removed {
                out.push_str(&format!("\n  - {}", file_name(path)));
            }
            for failure in &report.failures {
                out.push_str(&format!("\n  ! {}", failure));
            }
            out
        }
    }
}

/// Format the result of `archive`.
pub fn format_archive(report: &ArchiveReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&json!({
            "bundle": report.bundle.as_ref().map(|b| json!({
                "path": path_string(&b.path),
                "members": b.members,
                "size_bytes": b.size_bytes,
            })),
            "removed": report.removed.iter().map(|p| path_string(p)).collect::<Vec<_>>(),
            "failures": report.failures.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
        })),
        OutputMode::Human => match &report.bundle {
            None => "Nothing to archive".to_string(),
            Some(bundle) => {
                let mut out = format!(
                    "Archived {} snapshots into {} ({})",
                    bundle.members.len(),
                    bundle.path.display(),
                    human_size(bundle.size_bytes)
                );
                for failure in &report.failures {
                    out.push_str(&format!("\n  ! {}", failure));
                }
                out
            }
        },
    }
}

/// Format validator statistics for `verify`.
pub fn format_stats(path: &Path, stats: &ArchiveStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&json!({
            "path": path_string(path),
            "valid": true,
            "entries": stats.entry_count,
            "files": stats.file_count,
            "uncompressed_bytes": stats.uncompressed_bytes,
            "has_metadata": stats.has_metadata,
        })),
        OutputMode::Human => format!(
            "OK {}\n  entries: {} ({} files)\n  uncompressed: {}",
            path.display(),
            stats.entry_count,
            stats.file_count,
            human_size(stats.uncompressed_bytes)
        ),
    }
}

fn snapshot_json(s: &SnapshotInfo) -> Value {
    json!({
        "path": path_string(&s.path),
        "file_name": s.file_name,
        "size_bytes": s.size_bytes,
        "modified": local_time(s.modified),
        "metadata": s.metadata,
    })
}

fn cleanup_json(report: &CleanupReport) -> Value {
    json!({
        "kept": report.kept,
        "removed": report.removed.iter().map(|p| path_string(p)).collect::<Vec<_>>(),
        "failures": report.failures.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
    })
}

fn outcome_kind(outcome: &RestoreOutcome) -> &'static str {
    match outcome {
        RestoreOutcome::Success { .. } => "success",
        RestoreOutcome::SuccessWithWarnings { .. } => "success_with_warnings",
        RestoreOutcome::Aborted(_) => "aborted",
        RestoreOutcome::FailedRecovered { .. } => "failed_recovered",
        RestoreOutcome::FailedUnrecovered { .. } => "failed_unrecovered",
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_string(path))
}

fn local_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use treesnap_core::{EntryFailure, SnapshotMetadata, SystemInfo};

    fn info(tag: &str, description: &str) -> SnapshotInfo {
        SnapshotInfo {
            path: PathBuf::from(format!("/s/treesnap_snapshot_{}_20240101_000000.tar.gz", tag)),
            file_name: format!("treesnap_snapshot_{}_20240101_000000.tar.gz", tag),
            metadata: SnapshotMetadata {
                timestamp: "2024-01-01T00:00:00+00:00".to_string(),
                tag: tag.to_string(),
                description: description.to_string(),
                repo_path: "/r".to_string(),
                system: SystemInfo {
                    runtime_version: "treesnap 0.1.0".to_string(),
                    platform: "linux".to_string(),
                },
                git: None,
            },
            size_bytes: 2048,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_format_list_empty() {
        assert_eq!(format_list(&[], OutputMode::Human), "(empty list)");
        assert_eq!(format_list(&[], OutputMode::Json), "[]");
    }

    #[test]
    fn test_format_list_human() {
        let out = format_list(&[info("a", "nightly run"), info("b", "")], OutputMode::Human);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1) "));
        assert!(lines[0].contains("2.0 KiB"));
        assert!(lines[0].ends_with("\"nightly run\""));
        assert!(lines[1].ends_with("treesnap_snapshot_b_20240101_000000.tar.gz"));
    }

    #[test]
    fn test_format_list_json() {
        let out = format_list(&[info("a", "")], OutputMode::Json);
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["metadata"]["tag"], "a");
        assert_eq!(value[0]["size_bytes"], 2048);
    }

    #[test]
    fn test_format_cleanup_human() {
        let report = CleanupReport {
            kept: 2,
            removed: vec![PathBuf::from("/s/old.tar.gz")],
            failures: vec![EntryFailure::new("/s/locked.tar.gz", "permission denied")],
        };
        let out = format_cleanup(&report, OutputMode::Human);
        assert!(out.starts_with("Kept 2, removed 1"));
        assert!(out.contains("  - old.tar.gz"));
        assert!(out.contains("  ! /s/locked.tar.gz: permission denied"));
    }

    #[test]
    fn test_format_error() {
        assert_eq!(format_error(&"boom", OutputMode::Human), "(error) boom");
        let value: Value =
            serde_json::from_str(&format_error(&"boom", OutputMode::Json)).unwrap();
        assert_eq!(value["error"], "boom");
    }

    #[test]
    fn test_format_stats() {
        let stats = ArchiveStats {
            entry_count: 3,
            file_count: 2,
            uncompressed_bytes: 10,
            has_metadata: true,
        };
        let out = format_stats(Path::new("/s/a.tar.gz"), &stats, OutputMode::Human);
        assert!(out.starts_with("OK /s/a.tar.gz"));
        assert!(out.contains("3 (2 files)"));
    }
}
