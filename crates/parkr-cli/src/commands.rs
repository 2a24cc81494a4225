use clap::{Parser, Subcommand};
use parkr_core::report::SortField;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "parkr")]
#[command(about = "Park projects in an archive and reclaim local disk space", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the state file with a primary archive master
    Init {
        /// Archive root holding the category directories
        #[arg(long)]
        archive_root: Option<PathBuf>,
    },
    /// Start tracking a local directory by copying it into the archive
    Add {
        path: PathBuf,
        /// Archive category; detected from marker files when omitted
        #[arg(long)]
        category: Option<String>,
    },
    /// List projects in the archive
    #[command(visible_alias = "ls")]
    List {
        /// Only list one category
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show grabbed projects and whether they have unparked work
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Show details for one project
    Info {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// List project directories found in the local roots
    Local {
        /// Only show directories no grabbed project points at
        #[arg(long)]
        unmanaged: bool,
        #[arg(long)]
        json: bool,
    },
    /// Remove a project from state (and optionally its archive copy)
    Remove {
        name: String,
        /// Also delete the archive copy
        #[arg(long)]
        archive: bool,
        /// Skip typing the project name to confirm
        #[arg(long, short)]
        yes: bool,
    },
    /// Copy a project from the archive into a local working directory
    Grab {
        name: String,
        /// Overwrite an existing grab or local directory
        #[arg(long)]
        force: bool,
        /// Local directory to use instead of the category default
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Sync local changes back to the archive and record a safe point
    Park {
        name: String,
        /// Skip content hashing; only mtime verification will be possible
        #[arg(long)]
        no_hash: bool,
    },
    /// Delete one project's local copy after verifying it is parked
    Rm {
        name: String,
        /// Verify by modification time instead of content hash
        #[arg(long)]
        no_hash: bool,
        /// Delete without verification
        #[arg(long, conflicts_with = "no_hash")]
        force: bool,
    },
    /// Show grabbed projects with their size and deletion safety
    Report {
        /// Sort by size, modified or name
        #[arg(long, default_value = "modified")]
        sort: SortField,
        /// Only show projects that are safe to delete
        #[arg(long)]
        candidates: bool,
        /// Verify by modification time only
        #[arg(long)]
        no_hash: bool,
        #[arg(long)]
        json: bool,
    },
    /// Free up SIZE bytes by deleting the oldest safely parked projects
    Prune {
        /// Space to reclaim, e.g. 10G, 500M, 1.5GB
        #[arg(value_parser = parse_target)]
        size: u64,
        /// Actually delete; without this only the plan is shown
        #[arg(long)]
        exec: bool,
        /// Adjust the selection interactively before deleting
        #[arg(long, conflicts_with = "json")]
        interactive: bool,
        /// Verify by modification time only
        #[arg(long)]
        no_hash: bool,
        /// Consider every grabbed project and skip verification
        #[arg(long)]
        force: bool,
        #[arg(long)]
        json: bool,
    },
    /// Compare the state file with the filesystem
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Print configuration values
    Config,
}

fn parse_target(value: &str) -> Result<u64, String> {
    parkr_core::size::parse_size(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prune_flags() {
        let cli = Cli::try_parse_from(["parkr", "prune", "1.5G", "--exec", "--no-hash"]).unwrap();
        match cli.command {
            Some(Commands::Prune {
                size,
                exec,
                interactive,
                no_hash,
                force,
                json,
            }) => {
                assert_eq!(size, 1_610_612_736);
                assert!(exec && no_hash);
                assert!(!interactive && !force && !json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_size_is_rejected() {
        assert!(Cli::try_parse_from(["parkr", "prune", "lots"]).is_err());
        assert!(Cli::try_parse_from(["parkr", "prune", "0G"]).is_err());
    }

    #[test]
    fn test_interactive_conflicts_with_json() {
        assert!(Cli::try_parse_from(["parkr", "prune", "1G", "--interactive", "--json"]).is_err());
    }

    #[test]
    fn test_ls_alias_and_remove_flags() {
        let cli = Cli::try_parse_from(["parkr", "ls", "--category", "misc"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::List { category: Some(ref c), json: false }) if c == "misc"
        ));

        let cli = Cli::try_parse_from(["parkr", "remove", "alpha", "--archive", "-y"]).unwrap();
        match cli.command {
            Some(Commands::Remove { name, archive, yes }) => {
                assert_eq!(name, "alpha");
                assert!(archive && yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_local_unmanaged_flag() {
        let cli = Cli::try_parse_from(["parkr", "local", "--unmanaged"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Local {
                unmanaged: true,
                json: false
            })
        ));
    }

    #[test]
    fn test_report_sort_field() {
        let cli = Cli::try_parse_from(["parkr", "report", "--sort", "size"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Report {
                sort: SortField::Size,
                ..
            })
        ));
        assert!(Cli::try_parse_from(["parkr", "report", "--sort", "colour"]).is_err());
    }
}
