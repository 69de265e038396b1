//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("treesnap")
        .about("Point-in-time snapshots and safe rollback of a working directory")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("Configuration file (default: ./treesnap.toml if present)")
                .global(true),
        )
        .arg(
            Arg::new("repo")
                .long("repo")
                .value_name("DIR")
                .help("Working tree to manage (overrides repo_path)")
                .global(true),
        )
        .arg(
            Arg::new("snapshot-dir")
                .long("snapshot-dir")
                .value_name("DIR")
                .help("Snapshot directory (overrides snapshot_dir)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Debug logging (TREESNAP_LOG takes precedence)")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_create())
        .subcommand(build_list())
        .subcommand(build_restore())
        .subcommand(build_cleanup())
        .subcommand(build_archive())
        .subcommand(build_verify())
        .subcommand(build_init_config())
}

fn build_create() -> Command {
    Command::new("create")
        .about("Snapshot the working tree")
        .arg(
            Arg::new("tag")
                .required(true)
                .help("Snapshot tag (letters, digits, '_' and '-')"),
        )
        .arg(
            Arg::new("description")
                .long("description")
                .short('d')
                .value_name("TEXT")
                .default_value("")
                .help("Free-text description stored in the metadata"),
        )
}

fn build_list() -> Command {
    Command::new("list").about("List valid snapshots, newest first")
}

fn build_restore() -> Command {
    Command::new("restore")
        .about("Replace the working tree with a snapshot's contents")
        .arg(
            Arg::new("snapshot")
                .help("Snapshot file (default: the newest snapshot)"),
        )
        .arg(
            Arg::new("no-verify")
                .long("no-verify")
                .help("Skip archive validation before extracting")
                .action(ArgAction::SetTrue),
        )
}

fn build_cleanup() -> Command {
    Command::new("cleanup").about("Delete the oldest snapshots beyond the retention cap")
}

fn build_archive() -> Command {
    Command::new("archive")
        .about("Bundle snapshots beyond the retention cap, then delete them")
}

fn build_verify() -> Command {
    Command::new("verify")
        .about("Validate a snapshot archive and print what it contains")
        .arg(Arg::new("path").required(true).help("Archive to check"))
}

fn build_init_config() -> Command {
    Command::new("init-config").about("Write a commented default treesnap.toml if missing")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_restore_flags() {
        let matches = build_cli()
            .try_get_matches_from(["treesnap", "restore", "snap.tar.gz", "--no-verify"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "restore");
        assert_eq!(sub.get_one::<String>("snapshot").unwrap(), "snap.tar.gz");
        assert!(sub.get_flag("no-verify"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from(["treesnap", "list", "--json", "--config", "x.toml"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(sub.get_flag("json"));
        assert_eq!(sub.get_one::<String>("config").unwrap(), "x.toml");
    }

    #[test]
    fn test_create_requires_tag() {
        assert!(build_cli()
            .try_get_matches_from(["treesnap", "create"])
            .is_err());
    }
}
