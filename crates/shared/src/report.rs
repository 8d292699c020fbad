use anyhow::Result;
use std::path::Path;

use crate::checkpoint::SettingsStore;
use crate::db::{LabelMatch, TacoDb};
use crate::models::{Business, Review};

/// Read-only view of the taco database for reporting and downstream tools.
pub struct TacoReport {
    db: TacoDb,
}

impl TacoReport {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: TacoDb::open_readonly(path)?,
        })
    }

    pub fn list_all(&self) -> Result<Vec<Business>> {
        self.db.all_businesses()
    }

    pub fn get_by_id(&self, business_id: &str) -> Result<Option<Business>> {
        self.db.business(business_id)
    }

    pub fn reviews_for(&self, business_id: &str) -> Result<Vec<Review>> {
        self.db.reviews_for(business_id)
    }

    pub fn review_count(&self, business_id: &str) -> Result<u64> {
        self.db.review_count(business_id)
    }

    pub fn search(&self, query: &str) -> Result<Vec<Business>> {
        self.db.search(query)
    }

    pub fn by_best_taco(&self, label: &str, mode: LabelMatch) -> Result<Vec<Business>> {
        self.db.businesses_by_best_taco(label, mode)
    }

    pub fn top_best_tacos(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        self.db.top_best_tacos(limit)
    }

    pub fn total_count(&self) -> Result<u64> {
        self.db.business_count()
    }

    pub fn counts_by_postal_code(&self) -> Result<Vec<(String, u64)>> {
        self.db.counts_by_postal_code()
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.db.get_setting(key)
    }
}
