//! Checkpointed ingestion: search pages → details → reviews → best taco → store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;

use crate::checkpoint::{Checkpoint, SettingsStore, LAST_RUN_KEY};
use crate::config::SearchConfig;
use crate::db::TacoDb;
use crate::error::{self, ApiError};
use crate::models::{Business, BusinessSummary, Hours, NewReview, SearchPage};
use crate::retry::RetryPolicy;
use crate::summarizer::BestItem;

/// Where businesses, hours and reviews come from. Each call is one attempt.
#[async_trait]
pub trait BusinessSource: Send + Sync {
    async fn search_page(&self, search: &SearchConfig, offset: u32) -> error::Result<SearchPage>;
    async fn fetch_hours(&self, business_id: &str) -> error::Result<Hours>;
    async fn fetch_reviews(&self, business_id: &str, limit: u32) -> error::Result<Vec<NewReview>>;
}

/// Picks the best item from a restaurant's reviews. Never fails the run.
#[async_trait]
pub trait ItemSummarizer: Send + Sync {
    async fn summarize(&self, restaurant_name: &str, reviews: &[NewReview]) -> BestItem;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub search_calls: u32,
    pub pages: u32,
    pub processed: u32,
    pub skipped_existing: u32,
    pub skipped_failed: u32,
    pub summarized: u32,
    /// Offset the next run will start from
    pub next_offset: u32,
}

enum Outcome {
    Saved { summarized: bool },
    Skipped,
}

pub struct Ingestor<'a, S: BusinessSource, M: ItemSummarizer> {
    source: &'a S,
    summarizer: &'a M,
    db: &'a TacoDb,
    search: SearchConfig,
    retry: RetryPolicy,
}

impl<'a, S: BusinessSource, M: ItemSummarizer> Ingestor<'a, S, M> {
    pub fn new(source: &'a S, summarizer: &'a M, db: &'a TacoDb, search: SearchConfig) -> Self {
        Self {
            source,
            summarizer,
            db,
            search,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sweep the search results from the stored checkpoint to the end.
    ///
    /// The checkpoint moves forward only after every business on a page is
    /// stored, so a crash re-processes at most one page. When the sweep
    /// reaches the end it wraps back to 0.
    pub async fn run(&self) -> Result<IngestStats> {
        self.search.validate()?;

        let checkpoint = Checkpoint::new(self.db);
        let mut offset = checkpoint.load()?;
        if offset >= self.search.max_offset {
            tracing::info!(offset, "checkpoint past the last page, starting over");
            offset = 0;
        }

        let known: HashSet<String> = if self.search.refresh {
            HashSet::new()
        } else {
            self.db.business_ids()?
        };

        tracing::info!(
            term = %self.search.term,
            location = %self.search.location,
            offset,
            known = known.len(),
            "starting search"
        );

        let mut stats = IngestStats::default();

        loop {
            stats.search_calls += 1;
            let page = self
                .retry
                .run("search", || self.source.search_page(&self.search, offset))
                .await
                .inspect_err(|e| tracing::error!(offset, error = %e, "search failed, stopping"))
                .with_context(|| format!("Search request at offset {} failed", offset))?;

            if page.businesses.is_empty() {
                tracing::debug!(offset, "no more businesses returned");
                checkpoint.reset()?;
                stats.next_offset = 0;
                break;
            }
            stats.pages += 1;

            for business in &page.businesses {
                if known.contains(&business.id) {
                    tracing::debug!(id = %business.id, "already stored, skipping");
                    stats.skipped_existing += 1;
                    continue;
                }

                match self.process_business(business).await? {
                    Outcome::Saved { summarized } => {
                        stats.processed += 1;
                        if summarized {
                            stats.summarized += 1;
                        }
                    }
                    Outcome::Skipped => stats.skipped_failed += 1,
                }

                if !self.search.request_delay.is_zero() {
                    tokio::time::sleep(self.search.request_delay).await;
                }
            }

            offset += self.search.page_size;

            if u64::from(offset) >= page.total || offset >= self.search.max_offset {
                tracing::debug!(offset, total = page.total, "reached the end of the results");
                checkpoint.reset()?;
                stats.next_offset = 0;
                break;
            }

            checkpoint.save(offset)?;
            stats.next_offset = offset;
        }

        self.db
            .set_setting(LAST_RUN_KEY, &chrono::Utc::now().to_rfc3339())?;

        Ok(stats)
    }

    async fn process_business(&self, business: &BusinessSummary) -> Result<Outcome> {
        let id = business.id.as_str();

        let hours = match self
            .retry
            .run("business details", || self.source.fetch_hours(id))
            .await
        {
            Ok(hours) => hours,
            Err(ApiError::NotFound(_)) => {
                tracing::warn!(id, name = %business.name, "business not found, skipping");
                return Ok(Outcome::Skipped);
            }
            Err(e) if e.is_transient() => {
                return Err(anyhow::Error::new(e).context(format!("Fetching details for {} failed", id)));
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "could not fetch details, skipping");
                return Ok(Outcome::Skipped);
            }
        };

        let reviews = match self
            .retry
            .run("reviews", || {
                self.source.fetch_reviews(id, self.search.review_limit)
            })
            .await
        {
            Ok(reviews) => reviews,
            Err(e) if e.is_transient() => {
                return Err(anyhow::Error::new(e).context(format!("Fetching reviews for {} failed", id)));
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "could not fetch reviews, continuing without");
                Vec::new()
            }
        };

        let best_taco = if reviews.is_empty() {
            None
        } else {
            self.summarizer
                .summarize(&business.name, &reviews)
                .await
                .into_label()
        };

        let summarized = best_taco.is_some();
        let inserted = self.db.save_business(
            &Business {
                id: business.id.clone(),
                name: business.name.clone(),
                address: business.address.clone(),
                hours: Some(hours),
                best_taco,
            },
            &reviews,
        )?;

        tracing::info!(id, name = %business.name, reviews = inserted, "saved");
        Ok(Outcome::Saved { summarized })
    }
}
