//! Implementation of the `veer metrics` command.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::adapters::sqlite::SqliteConfigRepository;
use crate::cli::identity::{Identity, IdentityArgs};
use crate::cli::output::{format_percent, output, CommandOutput};
use crate::domain::models::MetricsSnapshot;
use crate::services::MetricsService;

#[derive(Args, Debug)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,
}

#[derive(Debug, serde::Serialize)]
pub struct MetricsOutput {
    #[serde(flatten)]
    pub snapshot: MetricsSnapshot,
}

impl CommandOutput for MetricsOutput {
    fn to_human(&self) -> String {
        [
            format!("Score: {}", self.snapshot.raw_score),
            format!("Awareness Quotient: {}", self.snapshot.awareness),
            format!(
                "Deviance Quotient: {}",
                format_percent(self.snapshot.deviance)
            ),
            format!(
                "Current level: {} point(s), {} deviance",
                self.snapshot.level_points,
                format_percent(self.snapshot.level_deviance)
            ),
        ]
        .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: MetricsArgs, json_mode: bool) -> Result<()> {
    let (_config, pool) = super::open_pool().await?;

    let identity = Identity::open(&args.identity, &pool).await?;
    let service = MetricsService::new(Arc::new(SqliteConfigRepository::new(pool)));
    let snapshot = service.snapshot(identity.store()).await?;
    identity.persist().await?;

    output(&MetricsOutput { snapshot }, json_mode);
    Ok(())
}
