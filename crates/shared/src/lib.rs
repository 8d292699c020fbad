// Public modules
pub mod checkpoint;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod summarizer;
pub mod yelp;

#[cfg(test)]
mod stub_server;

// Re-export commonly used types
pub use checkpoint::{Checkpoint, SettingsStore};
pub use config::{Config, LlmProvider, SearchConfig};
pub use db::{LabelMatch, TacoDb, DEFAULT_DB_PATH};
pub use error::ApiError;
pub use models::{Business, Hours, NewReview, Review};
pub use pipeline::{BusinessSource, IngestStats, Ingestor, ItemSummarizer};
pub use report::TacoReport;
pub use retry::RetryPolicy;
pub use summarizer::{BestItem, BestTacoSummarizer};
pub use yelp::YelpClient;
