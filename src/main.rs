use anyhow::Result;
use aoform::cli::{Cli, Command};
use aoform::config::StackConfig;
use aoform::engine::Engine;
use aoform::state::StackState;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let config = StackConfig::load(&cli.config)?;
    let state_path = match cli.state_file {
        Some(path) => path,
        None => StackState::default_path()?,
    };
    let state = StackState::load(&state_path)?;

    let mut engine = Engine::new(config, state, state_path);
    match cli.command {
        Command::Plan => engine.plan(),
        Command::Up => engine.up(),
        Command::Refresh => engine.refresh(),
        Command::Destroy { name } => engine.destroy(name.as_deref()),
    }
}
