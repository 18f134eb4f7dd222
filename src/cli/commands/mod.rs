//! CLI command implementations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::sqlite::initialize_database;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

pub mod advance;
pub mod import;
pub mod init;
pub mod metrics;
pub mod player;
pub mod progress;
pub mod render;
pub mod vote;

/// Load configuration and open the migrated database pool.
pub(crate) async fn open_pool() -> Result<(Config, SqlitePool)> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to open database. Run 'veer init' first.")?;
    Ok((config, pool))
}
