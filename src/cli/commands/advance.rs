//! Implementation of the `veer advance` command.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::adapters::sqlite::{SqliteConfigRepository, SqlitePollRepository};
use crate::cli::identity::{Identity, IdentityArgs};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Position;
use crate::services::ProgressionAdvancer;

#[derive(Args, Debug)]
pub struct AdvanceArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,
}

#[derive(Debug, serde::Serialize)]
pub struct AdvanceOutput {
    pub from: Position,
    pub to: Position,
    pub advanced: bool,
    pub stage_bonus: i64,
}

impl CommandOutput for AdvanceOutput {
    fn to_human(&self) -> String {
        if !self.advanced {
            return format!(
                "Nothing further: stage {}, level {} is the end of the catalog.",
                self.from.stage, self.from.level
            );
        }
        let mut lines = vec![format!(
            "Advanced from stage {}, level {} to stage {}, level {}.",
            self.from.stage, self.from.level, self.to.stage, self.to.level
        )];
        if self.stage_bonus > 0 {
            lines.push(format!("Stage bonus credited: {}", self.stage_bonus));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AdvanceArgs, json_mode: bool) -> Result<()> {
    let (_config, pool) = super::open_pool().await?;

    let identity = Identity::open(&args.identity, &pool).await?;
    let advancer = ProgressionAdvancer::new(
        Arc::new(SqlitePollRepository::new(pool.clone())),
        Arc::new(SqliteConfigRepository::new(pool)),
    );
    let outcome = advancer.advance(identity.store()).await?;
    identity.persist().await?;

    let output_data = AdvanceOutput {
        from: outcome.from,
        to: outcome.to,
        advanced: outcome.advanced,
        stage_bonus: outcome.stage_bonus,
    };
    output(&output_data, json_mode);
    Ok(())
}
