//! Loading an authored catalog into storage.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::Catalog;
use crate::domain::ports::{ConfigRepository, PollRepository};

/// Counts reported after a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub polls: usize,
    pub levels: usize,
    pub stages: usize,
}

/// Validates an authored catalog and stores it. Polls are keyed by their
/// (stage, level, order) position, so re-importing updated content keeps
/// recorded votes attached.
pub struct CatalogImportService<P: PollRepository, C: ConfigRepository> {
    polls: Arc<P>,
    configs: Arc<C>,
}

impl<P: PollRepository, C: ConfigRepository> CatalogImportService<P, C> {
    pub fn new(polls: Arc<P>, configs: Arc<C>) -> Self {
        Self { polls, configs }
    }

    /// Import one catalog. Validation happens up front; nothing is written
    /// when any record is malformed.
    #[instrument(skip(self, catalog))]
    pub async fn import(&self, catalog: Catalog) -> DomainResult<ImportSummary> {
        let records = catalog.into_domain()?;

        for poll in &records.polls {
            self.polls.store(poll).await?;
        }
        for level in &records.levels {
            self.configs.store_level(level).await?;
        }
        for stage in &records.stages {
            self.configs.store_stage(stage).await?;
        }

        let summary = ImportSummary {
            polls: records.polls.len(),
            levels: records.levels.len(),
            stages: records.stages.len(),
        };
        info!(
            polls = summary.polls,
            levels = summary.levels,
            stages = summary.stages,
            "catalog imported"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteConfigRepository, SqlitePollRepository,
    };
    use sqlx::SqlitePool;

    const CATALOG: &str = r"
polls:
  - stage: 1
    level: 1
    order: 1
    kind: multi_choice
    title: Spot the pattern
    options:
      - content: Anchoring
        points: 10
      - content: Nothing here
levels:
  - stage: 1
    level: 1
    show_interstitial: false
stages:
  - stage: 1
    completion_bonus: 50
    possible_points: 120
";

    fn service(pool: &SqlitePool) -> CatalogImportService<SqlitePollRepository, SqliteConfigRepository> {
        CatalogImportService::new(
            Arc::new(SqlitePollRepository::new(pool.clone())),
            Arc::new(SqliteConfigRepository::new(pool.clone())),
        )
    }

    #[tokio::test]
    async fn test_import_stores_all_sections() {
        let pool = create_migrated_test_pool().await.unwrap();
        let summary = service(&pool)
            .import(Catalog::from_yaml(CATALOG).unwrap())
            .await
            .unwrap();
        assert_eq!(summary, ImportSummary { polls: 1, levels: 1, stages: 1 });

        let polls = SqlitePollRepository::new(pool.clone());
        let poll = polls.get_by_position(1, 1, 1).await.unwrap().unwrap();
        assert_eq!(poll.title, "Spot the pattern");
        assert_eq!(poll.options.len(), 2);

        let configs = SqliteConfigRepository::new(pool.clone());
        let level = configs.get_level(1, 1).await.unwrap().unwrap();
        assert!(!level.show_interstitial);
        let stage = configs.get_stage(1).await.unwrap().unwrap();
        assert_eq!(stage.completion_bonus, 50);
        assert_eq!(stage.possible_points, 120);
    }

    #[tokio::test]
    async fn test_reimport_keeps_poll_identity() {
        let pool = create_migrated_test_pool().await.unwrap();
        let svc = service(&pool);
        svc.import(Catalog::from_yaml(CATALOG).unwrap()).await.unwrap();

        let polls = SqlitePollRepository::new(pool.clone());
        let before = polls.get_by_position(1, 1, 1).await.unwrap().unwrap();

        let updated = CATALOG.replace("Spot the pattern", "Name the pattern");
        svc.import(Catalog::from_yaml(&updated).unwrap()).await.unwrap();

        let after = polls.get_by_position(1, 1, 1).await.unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.title, "Name the pattern");
    }

    #[tokio::test]
    async fn test_invalid_catalog_writes_nothing() {
        let pool = create_migrated_test_pool().await.unwrap();
        let broken = r"
polls:
  - stage: 1
    level: 1
    order: 1
    kind: binary_placement
    title: Missing side tags
    options:
      - content: A
      - content: B
";
        let err = service(&pool)
            .import(Catalog::from_yaml(broken).unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("correct side"));

        let polls = SqlitePollRepository::new(pool.clone());
        assert!(polls.get_by_position(1, 1, 1).await.unwrap().is_none());
    }
}
