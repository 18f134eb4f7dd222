//! Implementation of the `veer progress` command.

use std::collections::HashSet;

use anyhow::Result;
use clap::Args;
use uuid::Uuid;

use crate::adapters::sqlite::SqlitePollRepository;
use crate::cli::identity::{Identity, IdentityArgs};
use crate::cli::output::{output, CommandOutput};
use crate::domain::ports::PollRepository;

#[derive(Args, Debug)]
pub struct ProgressArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,
}

#[derive(Debug, serde::Serialize)]
pub struct ProgressOutput {
    pub identity: String,
    pub durable: bool,
    pub stage: u32,
    pub level: u32,
    pub score: i64,
    pub answered_in_level: usize,
    pub polls_in_level: usize,
}

impl CommandOutput for ProgressOutput {
    fn to_human(&self) -> String {
        let kind = if self.durable { "player" } else { "guest" };
        [
            format!("{} {}", kind, self.identity),
            format!("Position: stage {}, level {}", self.stage, self.level),
            format!("Score: {}", self.score),
            format!(
                "Level progress: {}/{} poll(s) answered",
                self.answered_in_level, self.polls_in_level
            ),
        ]
        .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ProgressArgs, json_mode: bool) -> Result<()> {
    let (_config, pool) = super::open_pool().await?;

    let identity = Identity::open(&args.identity, &pool).await?;
    let store = identity.store();
    let position = store.position().await?;
    let score = store.score().await?;

    let polls = SqlitePollRepository::new(pool.clone());
    let level_polls = polls.list_level(position.stage, position.level).await?;
    let history = store.level_history(position.stage, position.level).await?;
    let answered: HashSet<Uuid> = history.iter().map(|e| e.vote.poll_id).collect();
    let answered_in_level = level_polls
        .iter()
        .filter(|p| answered.contains(&p.id))
        .count();

    // A fresh guest has nothing to write back, but persisting keeps the
    // session id stable across reads.
    identity.persist().await?;

    let output_data = ProgressOutput {
        identity: store.identity().to_string(),
        durable: store.is_durable(),
        stage: position.stage,
        level: position.level,
        score,
        answered_in_level,
        polls_in_level: level_polls.len(),
    };
    output(&output_data, json_mode);
    Ok(())
}
