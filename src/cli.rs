use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aoform")]
#[command(version)]
#[command(about = "Declarative management of AO processes and code bundles", long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Stack file to reconcile
    #[arg(short, long, global = true, default_value = "aoform.toml")]
    pub config: PathBuf,

    /// State file (defaults to ~/.local/state/aoform/state.toml)
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what an apply would change, without touching anything
    Plan,

    /// Apply the declared stack to the network
    Up,

    /// Re-read tracked processes from the network into local state
    Refresh,

    /// Remove resources from local tracking (the network is untouched)
    Destroy {
        /// Remove a single resource by name instead of everything
        #[arg(long)]
        name: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["aoform", "plan"]);
        assert_eq!(cli.config, PathBuf::from("aoform.toml"));
        assert!(cli.state_file.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_destroy_accepts_name() {
        let cli = Cli::parse_from(["aoform", "destroy", "--name", "my-agent"]);
        match cli.command {
            Command::Destroy { name } => assert_eq!(name.as_deref(), Some("my-agent")),
            _ => panic!("expected destroy"),
        }
    }
}
