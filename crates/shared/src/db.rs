use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::checkpoint::SettingsStore;
use crate::models::{Business, Hours, NewReview, Review};

pub const DEFAULT_DB_PATH: &str = "taco_restaurants.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS taco_restaurants (
    id TEXT PRIMARY KEY,
    name TEXT,
    address TEXT,
    hours TEXT,
    best_taco TEXT
);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    restaurant_id TEXT NOT NULL REFERENCES taco_restaurants(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    rating REAL CHECK (rating IS NULL OR rating BETWEEN 1 AND 5),
    date TEXT,
    UNIQUE(restaurant_id, text)
);

CREATE INDEX IF NOT EXISTS idx_reviews_restaurant ON reviews(restaurant_id);

CREATE TABLE IF NOT EXISTS app_settings (
    key TEXT PRIMARY KEY,
    value TEXT
);
"#;

const BUSINESS_COLUMNS: &str = "id, name, address, hours, best_taco";

/// How a best-taco label is compared against the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatch {
    /// Case-insensitive substring
    Contains,
    /// Case-insensitive, whitespace-trimmed equality
    Exact,
}

/// SQLite store for taco restaurants, their reviews and app settings.
pub struct TacoDb {
    conn: Connection,
}

impl TacoDb {
    /// Open (creating if needed) a read-write database and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    /// Open an existing database without write access.
    pub fn open_readonly(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            anyhow::bail!("Database file not found: {}", path.display());
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Ok(Self { conn })
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create database schema")?;
        Ok(Self { conn })
    }

    // ---- writes ----

    /// Insert a business, or overwrite every field of an existing one with the same id.
    pub fn upsert_business(&self, business: &Business) -> Result<()> {
        upsert_business_on(&self.conn, business)
    }

    /// Attach reviews to a stored business. Reviews whose text is already
    /// stored, or whose rating is outside 1..=5, are skipped. Returns how many
    /// were new. Fails if the business does not exist.
    pub fn insert_reviews(&self, business_id: &str, reviews: &[NewReview]) -> Result<usize> {
        if reviews.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let inserted = insert_reviews_on(&tx, business_id, reviews)?;
        tx.commit()?;

        tracing::debug!(business_id, inserted, "reviews saved");
        Ok(inserted)
    }

    /// Upsert a business and attach its reviews in one transaction, so a
    /// business is never stored without the reviews fetched alongside it.
    /// Returns how many reviews were new.
    pub fn save_business(&self, business: &Business, reviews: &[NewReview]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        upsert_business_on(&tx, business)?;
        let inserted = insert_reviews_on(&tx, &business.id, reviews)?;
        tx.commit()
            .with_context(|| format!("Failed to commit restaurant {}", business.id))?;

        tracing::debug!(business_id = %business.id, inserted, "restaurant saved");
        Ok(inserted)
    }

    /// Remove a business and all of its reviews. Returns false if it did not exist.
    pub fn delete_business(&self, business_id: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        // Older databases lack the cascading foreign key
        tx.execute(
            "DELETE FROM reviews WHERE restaurant_id = ?1",
            params![business_id],
        )?;
        let deleted = tx.execute(
            "DELETE FROM taco_restaurants WHERE id = ?1",
            params![business_id],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    // ---- reads ----

    pub fn business_ids(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM taco_restaurants")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    pub fn all_businesses(&self) -> Result<Vec<Business>> {
        self.query_businesses(
            &format!(
                "SELECT {} FROM taco_restaurants ORDER BY name COLLATE NOCASE, id",
                BUSINESS_COLUMNS
            ),
            [],
        )
    }

    pub fn business(&self, business_id: &str) -> Result<Option<Business>> {
        let business = self
            .conn
            .query_row(
                &format!("SELECT {} FROM taco_restaurants WHERE id = ?1", BUSINESS_COLUMNS),
                params![business_id],
                map_business,
            )
            .optional()?;
        Ok(business)
    }

    /// Reviews for a business, newest first.
    pub fn reviews_for(&self, business_id: &str) -> Result<Vec<Review>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, restaurant_id, text, rating, date
             FROM reviews
             WHERE restaurant_id = ?1
             ORDER BY date DESC, id DESC",
        )?;
        let reviews = stmt
            .query_map(params![business_id], |row| {
                Ok(Review {
                    id: row.get(0)?,
                    business_id: row.get(1)?,
                    text: row.get(2)?,
                    rating: row.get(3)?,
                    date: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviews)
    }

    pub fn review_count(&self, business_id: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE restaurant_id = ?1",
            params![business_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Case-insensitive substring search over name and address.
    pub fn search(&self, query: &str) -> Result<Vec<Business>> {
        let pattern = like_pattern(query);
        self.query_businesses(
            &format!(
                r"SELECT {} FROM taco_restaurants
                  WHERE name LIKE ?1 ESCAPE '\' OR address LIKE ?1 ESCAPE '\'
                  ORDER BY name COLLATE NOCASE, id",
                BUSINESS_COLUMNS
            ),
            params![pattern],
        )
    }

    pub fn businesses_by_best_taco(&self, label: &str, mode: LabelMatch) -> Result<Vec<Business>> {
        match mode {
            LabelMatch::Contains => self.query_businesses(
                &format!(
                    r"SELECT {} FROM taco_restaurants
                      WHERE best_taco LIKE ?1 ESCAPE '\'
                      ORDER BY name COLLATE NOCASE, id",
                    BUSINESS_COLUMNS
                ),
                params![like_pattern(label)],
            ),
            LabelMatch::Exact => self.query_businesses(
                &format!(
                    "SELECT {} FROM taco_restaurants
                     WHERE LOWER(TRIM(best_taco)) = LOWER(TRIM(?1))
                     ORDER BY name COLLATE NOCASE, id",
                    BUSINESS_COLUMNS
                ),
                params![label],
            ),
        }
    }

    /// Best-taco labels with how many restaurants share them, most common first.
    pub fn top_best_tacos(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT best_taco, COUNT(*) AS count
             FROM taco_restaurants
             WHERE best_taco IS NOT NULL
               AND TRIM(best_taco) != ''
               AND LOWER(best_taco) != 'unknown'
             GROUP BY best_taco
             ORDER BY count DESC, best_taco ASC
             LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn business_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM taco_restaurants", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Restaurant counts per five-digit ZIP code found in the address,
    /// most restaurants first. Addresses without a ZIP are not counted.
    pub fn counts_by_postal_code(&self) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare("SELECT address FROM taco_restaurants")?;
        let addresses = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for address in addresses.into_iter().flatten() {
            if let Some(zip) = postal_code(&address) {
                *counts.entry(zip).or_default() += 1;
            }
        }

        let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    fn query_businesses<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Business>> {
        let mut stmt = self.conn.prepare(sql)?;
        let businesses = stmt
            .query_map(params, map_business)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(businesses)
    }
}

impl SettingsStore for TacoDb {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .with_context(|| format!("Failed to read setting {}", key))?;
        Ok(value.flatten())
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO app_settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("Failed to save setting {}", key))?;
        Ok(())
    }
}

fn upsert_business_on(conn: &Connection, business: &Business) -> Result<()> {
    let hours = business
        .hours
        .as_ref()
        .map(Hours::to_json)
        .transpose()
        .context("Failed to serialize hours")?;

    conn.execute(
        "INSERT INTO taco_restaurants (id, name, address, hours, best_taco)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            address = excluded.address,
            hours = excluded.hours,
            best_taco = excluded.best_taco",
        params![
            business.id,
            business.name,
            business.address,
            hours,
            business.best_taco
        ],
    )
    .with_context(|| format!("Failed to save restaurant {}", business.id))?;
    Ok(())
}

fn insert_reviews_on(conn: &Connection, business_id: &str, reviews: &[NewReview]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO reviews (restaurant_id, text, rating, date)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut inserted = 0;
    for review in reviews {
        inserted += stmt
            .execute(params![business_id, review.text, review.rating, review.date])
            .with_context(|| format!("Failed to save review for {}", business_id))?;
    }
    Ok(inserted)
}

fn map_business(row: &Row<'_>) -> rusqlite::Result<Business> {
    let hours: Option<String> = row.get(3)?;
    Ok(Business {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        address: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        // Rows written by older versions may hold free-form hours text
        hours: hours.and_then(|h| Hours::from_json(&h).ok()),
        best_taco: row.get(4)?,
    })
}

/// `%query%` with LIKE wildcards in the query escaped by backslash.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Last five-digit (optionally ZIP+4) token in an address.
pub fn postal_code(address: &str) -> Option<String> {
    address
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(|token| {
            let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
            let (zip, plus_four) = match token.split_once('-') {
                Some((zip, rest)) => (zip, Some(rest)),
                None => (token, None),
            };
            let is_zip = zip.len() == 5 && zip.bytes().all(|b| b.is_ascii_digit());
            let plus_four_ok =
                plus_four.map_or(true, |p| p.len() == 4 && p.bytes().all(|b| b.is_ascii_digit()));
            (is_zip && plus_four_ok).then(|| zip.to_string())
        })
        .last()
}
