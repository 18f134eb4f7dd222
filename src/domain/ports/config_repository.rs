use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{LevelConfig, StageConfig};

/// Repository port for imported level and stage configuration.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Upsert a level configuration, keyed by (stage, level).
    async fn store_level(&self, config: &LevelConfig) -> DomainResult<()>;

    /// Get the configuration for one level.
    async fn get_level(&self, stage: u32, level: u32) -> DomainResult<Option<LevelConfig>>;

    /// Upsert a stage configuration.
    async fn store_stage(&self, config: &StageConfig) -> DomainResult<()>;

    /// Get the configuration for one stage.
    async fn get_stage(&self, stage: u32) -> DomainResult<Option<StageConfig>>;

    /// All stage configurations, ascending by stage.
    async fn list_stages(&self) -> DomainResult<Vec<StageConfig>>;
}
