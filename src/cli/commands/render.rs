//! Implementation of the `veer render` command.
//!
//! Resolves message placeholders against an identity's play history, the
//! same pass interstitial and feedback text go through before display.
//! Useful for previewing authored templates.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::adapters::sqlite::{SqliteConfigRepository, SqlitePollRepository};
use crate::cli::identity::{Identity, IdentityArgs};
use crate::cli::output::{output, CommandOutput};
use crate::services::{MessageResolver, MetricsService};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Template text, e.g. "You scored [[PointTotal]] so far"
    pub text: String,

    #[command(flatten)]
    pub identity: IdentityArgs,
}

#[derive(Debug, serde::Serialize)]
pub struct RenderOutput {
    pub text: String,
}

impl CommandOutput for RenderOutput {
    fn to_human(&self) -> String {
        self.text.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RenderArgs, json_mode: bool) -> Result<()> {
    let (_config, pool) = super::open_pool().await?;

    let identity = Identity::open(&args.identity, &pool).await?;
    let resolver = MessageResolver::new(
        Arc::new(SqlitePollRepository::new(pool.clone())),
        MetricsService::new(Arc::new(SqliteConfigRepository::new(pool))),
    );
    let text = resolver.resolve(identity.store(), &args.text).await?;
    identity.persist().await?;

    output(&RenderOutput { text }, json_mode);
    Ok(())
}
