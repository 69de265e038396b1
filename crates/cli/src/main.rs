//! treesnap CLI: point-in-time snapshots of a working directory.
//!
//! `treesnap [flags] COMMAND` runs a single command and exits with 0 on
//! success, 1 on failure.

mod commands;
mod format;

use std::path::{Path, PathBuf};
use std::process;

use clap::ArgMatches;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use treesnap_archive::ArchiveReader;
use treesnap_engine::{SnapshotConfig, SnapshotEngine, CONFIG_FILE_NAME};

use commands::build_cli;
use format::{
    format_archive, format_cleanup, format_create, format_error, format_list, format_restore,
    format_stats, OutputMode,
};

/// Environment variable holding a `tracing` filter directive
const LOG_ENV: &str = "TREESNAP_LOG";

fn main() {
    let matches = build_cli().get_matches();
    let Some((name, sub)) = matches.subcommand() else {
        process::exit(2);
    };

    init_tracing(sub.get_flag("verbose"));

    let mode = if sub.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    // Handle `init-config` before loading any configuration.
    if name == "init-config" {
        process::exit(run_init_config(sub, mode));
    }

    let config = match load_config(sub) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    };

    // `verify` only reads the archive; it never needs the directories.
    if name == "verify" {
        process::exit(run_verify(sub, &config, mode));
    }

    let engine = match SnapshotEngine::open(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    };

    process::exit(run_command(name, sub, &engine, mode));
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve the configuration: explicit `--config`, else `./treesnap.toml`
/// if present, else defaults; `--repo` and `--snapshot-dir` override.
fn load_config(matches: &ArgMatches) -> Result<SnapshotConfig, String> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => SnapshotConfig::from_file(Path::new(path)).map_err(|e| e.to_string())?,
        None if Path::new(CONFIG_FILE_NAME).is_file() => {
            SnapshotConfig::from_file(Path::new(CONFIG_FILE_NAME)).map_err(|e| e.to_string())?
        }
        None => SnapshotConfig::default(),
    };

    if let Some(repo) = matches.get_one::<String>("repo") {
        config.repo_path = PathBuf::from(repo);
    }
    if let Some(dir) = matches.get_one::<String>("snapshot-dir") {
        config.snapshot_dir = PathBuf::from(dir);
    }
    config.validate().map_err(|e| e.to_string())?;
    debug!(
        target: "treesnap::cli",
        repo = %config.repo_path.display(),
        snapshot_dir = %config.snapshot_dir.display(),
        max_snapshots = config.retention_cap(),
        "Configuration loaded"
    );
    Ok(config)
}

fn run_command(name: &str, matches: &ArgMatches, engine: &SnapshotEngine, mode: OutputMode) -> i32 {
    match name {
        "create" => {
            let tag = matches
                .get_one::<String>("tag")
                .map(String::as_str)
                .unwrap_or_default();
            let description = matches
                .get_one::<String>("description")
                .map(String::as_str)
                .unwrap_or_default();
            match engine.create(tag, description) {
                Ok(report) => print_ok(format_create(&report, mode)),
                Err(e) => print_err(&e, mode),
            }
        }
        "list" => match engine.list() {
            Ok(snapshots) => print_ok(format_list(&snapshots, mode)),
            Err(e) => print_err(&e, mode),
        },
        "restore" => {
            let snapshot = match matches.get_one::<String>("snapshot") {
                Some(path) => PathBuf::from(path),
                None => match engine.latest() {
                    Ok(Some(latest)) => latest.path,
                    Ok(None) => return print_err(&"no valid snapshots to restore", mode),
                    Err(e) => return print_err(&e, mode),
                },
            };
            let verify = engine.config().verify_on_restore && !matches.get_flag("no-verify");
            let outcome = engine.restore(&snapshot, verify);
            let formatted = format_restore(&outcome, mode);
            if outcome.is_success() {
                print_ok(formatted)
            } else {
                eprintln!("{}", formatted);
                1
            }
        }
        "cleanup" => match engine.cleanup() {
            Ok(report) => print_ok(format_cleanup(&report, mode)),
            Err(e) => print_err(&e, mode),
        },
        "archive" => match engine.archive_overflow() {
            Ok(report) => print_ok(format_archive(&report, mode)),
            Err(e) => print_err(&e, mode),
        },
        other => print_err(&format!("unknown command '{}'", other), mode),
    }
}

fn run_verify(matches: &ArgMatches, config: &SnapshotConfig, mode: OutputMode) -> i32 {
    let Some(path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        return print_err(&"missing archive path", mode);
    };
    match ArchiveReader::new(config.limits()).check_snapshot(&path) {
        Ok(stats) => print_ok(format_stats(&path, &stats, mode)),
        Err(e) => print_err(&e, mode),
    }
}

fn run_init_config(matches: &ArgMatches, mode: OutputMode) -> i32 {
    let path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    match SnapshotConfig::write_default_if_missing(&path) {
        Ok(true) => print_ok(format!("Wrote {}", path.display())),
        Ok(false) => print_ok(format!("{} already exists, left unchanged", path.display())),
        Err(e) => print_err(&e, mode),
    }
}

fn print_ok(formatted: String) -> i32 {
    if !formatted.is_empty() {
        println!("{}", formatted);
    }
    0
}

fn print_err(err: &dyn std::fmt::Display, mode: OutputMode) -> i32 {
    eprintln!("{}", format_error(err, mode));
    1
}
