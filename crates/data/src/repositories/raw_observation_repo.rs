//! Raw observation repository.
//!
//! Upserts scraped rows keyed by offering name and tracks which rows the
//! scoring pipeline has already delivered.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::RawObservation;

/// Identifies one version of a raw row: its name and the scrape it came from.
///
/// Marking by both keeps a row that was re-scraped mid-run unprocessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationKey {
    pub offering_name: String,
    pub scraped_at: DateTime<Utc>,
}

impl From<&RawObservation> for ObservationKey {
    fn from(observation: &RawObservation) -> Self {
        Self {
            offering_name: observation.offering_name.clone(),
            scraped_at: observation.scraped_at,
        }
    }
}

/// Repository for the `ipo_raw_data` table.
#[derive(Debug, Clone)]
pub struct RawObservationRepository {
    pool: SqlitePool,
}

const UPSERT_SQL: &str = r"
    INSERT INTO ipo_raw_data
        (offering_name, gmp, subscription_multiple, offer_price, offer_size,
         lot_size, listing_date, has_anchor_investor, scraped_at, is_processed)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
    ON CONFLICT(offering_name) DO UPDATE SET
        gmp = excluded.gmp,
        subscription_multiple = excluded.subscription_multiple,
        offer_price = excluded.offer_price,
        offer_size = excluded.offer_size,
        lot_size = excluded.lot_size,
        listing_date = excluded.listing_date,
        has_anchor_investor = excluded.has_anchor_investor,
        scraped_at = excluded.scraped_at,
        is_processed = 0
";

const SELECT_COLUMNS: &str = r"
    SELECT offering_name, gmp, subscription_multiple, offer_price, offer_size,
           lot_size, listing_date, has_anchor_investor, scraped_at, is_processed
    FROM ipo_raw_data
";

impl RawObservationRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts an observation or overwrites the existing row with the same name.
    ///
    /// An overwritten row becomes unprocessed again so the new data is scored.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn upsert(&self, observation: &RawObservation) -> Result<()> {
        sqlx::query(UPSERT_SQL)
            .bind(&observation.offering_name)
            .bind(&observation.gmp)
            .bind(&observation.subscription_multiple)
            .bind(&observation.offer_price)
            .bind(&observation.offer_size)
            .bind(observation.lot_size)
            .bind(&observation.listing_date)
            .bind(observation.has_anchor_investor)
            .bind(observation.scraped_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Upserts a batch of observations in one transaction.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn upsert_batch(&self, observations: &[RawObservation]) -> Result<usize> {
        if observations.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        for observation in observations {
            sqlx::query(UPSERT_SQL)
                .bind(&observation.offering_name)
                .bind(&observation.gmp)
                .bind(&observation.subscription_multiple)
                .bind(&observation.offer_price)
                .bind(&observation.offer_size)
                .bind(observation.lot_size)
                .bind(&observation.listing_date)
                .bind(observation.has_anchor_investor)
                .bind(observation.scraped_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(observations.len())
    }

    /// Gets the observation for an exact offering name.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(&self, offering_name: &str) -> Result<Option<RawObservation>> {
        let record = sqlx::query_as::<_, RawObservation>(&format!(
            "{SELECT_COLUMNS} WHERE offering_name = ?1"
        ))
        .bind(offering_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Lists observations not yet scored and delivered, oldest scrape first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_unprocessed(&self) -> Result<Vec<RawObservation>> {
        let records = sqlx::query_as::<_, RawObservation>(&format!(
            "{SELECT_COLUMNS} WHERE is_processed = 0 ORDER BY scraped_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Lists every observation by name.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> Result<Vec<RawObservation>> {
        let records = sqlx::query_as::<_, RawObservation>(&format!(
            "{SELECT_COLUMNS} ORDER BY offering_name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Counts observations still waiting to be processed.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count_unprocessed(&self) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM ipo_raw_data WHERE is_processed = 0")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Flags the given row versions as processed.
    ///
    /// A row whose `scraped_at` no longer matches was re-scraped after it was
    /// selected and stays unprocessed. Returns the number of rows flagged.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn mark_processed(&self, keys: &[ObservationKey]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut marked = 0;

        for key in keys {
            let result = sqlx::query(
                r"
                UPDATE ipo_raw_data
                SET is_processed = 1
                WHERE offering_name = ?1 AND scraped_at = ?2
                ",
            )
            .bind(&key.offering_name)
            .bind(key.scraped_at)
            .execute(&mut *tx)
            .await?;

            marked += result.rows_affected();
        }

        tx.commit().await?;
        Ok(marked)
    }
}
