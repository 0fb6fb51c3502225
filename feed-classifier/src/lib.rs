pub mod types;
pub mod traits;
pub mod config;
pub mod fetcher;
pub mod sources;
pub mod collector;
pub mod llm_adapter;
pub mod store;
pub mod pipeline;

pub use types::*;
pub use traits::{Classifier, DocumentStore, FeedSource};
pub use config::AppConfig;
pub use fetcher::Fetcher;
pub use sources::{BlueskyCredentials, BlueskyFeedSource, StaticFeedSource};
pub use collector::{CollectStats, Collector, DocumentSet};
pub use llm_adapter::{build_prompt, MockClassifier, OpenAiClassifier};
pub use store::FsCategoryStore;
pub use pipeline::{
    ClassificationPipeline, FailureReason, FailureStage, ItemOutcome, Pacer, PartitionSummary, ProcessedItem, RunReport,
};
