//! Implementation of the `veer import` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

use crate::adapters::sqlite::{SqliteConfigRepository, SqlitePollRepository};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Catalog;
use crate::services::CatalogImportService;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Catalog file (YAML) produced by the authoring system
    pub file: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct ImportOutput {
    pub success: bool,
    pub polls: usize,
    pub levels: usize,
    pub stages: usize,
}

impl CommandOutput for ImportOutput {
    fn to_human(&self) -> String {
        format!(
            "Imported {} poll(s), {} level config(s), {} stage config(s).",
            self.polls, self.levels, self.stages
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ImportArgs, json_mode: bool) -> Result<()> {
    let (_config, pool) = super::open_pool().await?;

    let text = fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read catalog {}", args.file.display()))?;
    let catalog = Catalog::from_yaml(&text)?;

    let service = CatalogImportService::new(
        Arc::new(SqlitePollRepository::new(pool.clone())),
        Arc::new(SqliteConfigRepository::new(pool)),
    );
    let summary = service.import(catalog).await?;

    let output_data = ImportOutput {
        success: true,
        polls: summary.polls,
        levels: summary.levels,
        stages: summary.stages,
    };
    output(&output_data, json_mode);
    Ok(())
}
