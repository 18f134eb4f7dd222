//! Command-line interface for the veer progression engine.

pub mod commands;
pub mod id_resolver;
pub mod identity;
pub mod output;

use clap::{Parser, Subcommand};

/// Veer - bias-awareness game engine
#[derive(Parser)]
#[command(name = "veer")]
#[command(about = "Veer - bias-awareness game engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the .veer directory and database
    Init(commands::init::InitArgs),
    /// Import a poll catalog from a YAML file
    Import(commands::import::ImportArgs),
    /// Manage durable players
    Player(commands::player::PlayerArgs),
    /// Cast a ballot on a poll
    Vote(commands::vote::VoteArgs),
    /// Show the current position and level coverage
    Progress(commands::progress::ProgressArgs),
    /// Show score and calibration metrics
    Metrics(commands::metrics::MetricsArgs),
    /// Advance to the next level or stage
    Advance(commands::advance::AdvanceArgs),
    /// Render a message template with placeholders resolved
    Render(commands::render::RenderArgs),
}

/// Print an error in the requested format and exit with a failure code.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let payload = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{payload}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
