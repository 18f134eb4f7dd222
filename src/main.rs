//! Veer CLI entry point.

use clap::Parser;

use veer::cli::{Cli, Commands};
use veer::infrastructure::config::ConfigLoader;
use veer::infrastructure::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => veer::cli::handle_error(err, cli.json),
    };

    if let Err(err) = init_logging(&config.logging) {
        veer::cli::handle_error(err, cli.json);
    }

    let result = match cli.command {
        Commands::Init(args) => veer::cli::commands::init::execute(args, cli.json).await,
        Commands::Import(args) => veer::cli::commands::import::execute(args, cli.json).await,
        Commands::Player(args) => veer::cli::commands::player::execute(args, cli.json).await,
        Commands::Vote(args) => veer::cli::commands::vote::execute(args, cli.json).await,
        Commands::Progress(args) => veer::cli::commands::progress::execute(args, cli.json).await,
        Commands::Metrics(args) => veer::cli::commands::metrics::execute(args, cli.json).await,
        Commands::Advance(args) => veer::cli::commands::advance::execute(args, cli.json).await,
        Commands::Render(args) => veer::cli::commands::render::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        veer::cli::handle_error(err, cli.json);
    }
}
