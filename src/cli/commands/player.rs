//! Player CLI commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::adapters::sqlite::SqlitePlayerRepository;
use crate::cli::id_resolver::resolve_player_id;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Player;
use crate::domain::ports::PlayerRepository;

#[derive(Args, Debug)]
pub struct PlayerArgs {
    #[command(subcommand)]
    pub command: PlayerCommands,
}

#[derive(Subcommand, Debug)]
pub enum PlayerCommands {
    /// Create a durable player identity
    New,
    /// Show a player's progression and score
    Show {
        /// Player ID (any unique prefix)
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct PlayerOutput {
    pub id: String,
    pub score: i64,
    pub stage: u32,
    pub level: u32,
}

impl From<&Player> for PlayerOutput {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.to_string(),
            score: player.score,
            stage: player.stage,
            level: player.level,
        }
    }
}

impl CommandOutput for PlayerOutput {
    fn to_human(&self) -> String {
        [
            format!("Player: {}", self.id),
            format!("Position: stage {}, level {}", self.stage, self.level),
            format!("Score: {}", self.score),
        ]
        .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: PlayerArgs, json_mode: bool) -> Result<()> {
    let (_config, pool) = super::open_pool().await?;
    let players = SqlitePlayerRepository::new(pool.clone());

    match args.command {
        PlayerCommands::New => {
            let player = players.ensure(Uuid::new_v4()).await?;
            output(&PlayerOutput::from(&player), json_mode);
        }
        PlayerCommands::Show { id } => {
            let uuid = resolve_player_id(&pool, &id).await?;
            let player = players
                .get(uuid)
                .await?
                .ok_or_else(|| anyhow!("Player not found: {}", id))?;
            output(&PlayerOutput::from(&player), json_mode);
        }
    }
    Ok(())
}
