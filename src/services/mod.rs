pub mod catalog_import;
pub mod level_completion;
pub mod message_resolver;
pub mod metrics;
pub mod progression;
pub mod settlement;
pub mod tier;

pub use catalog_import::{CatalogImportService, ImportSummary};
pub use level_completion::LevelCompletionService;
pub use message_resolver::MessageResolver;
pub use metrics::MetricsService;
pub use progression::{AdvanceOutcome, ProgressionAdvancer};
pub use settlement::SettlementService;
pub use tier::TierClassifier;
