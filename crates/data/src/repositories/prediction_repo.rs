//! Prediction repository.
//!
//! The predictions table always holds the most recently published batch.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::ScoredPrediction;

/// Repository for the `ipo_predictions` table.
#[derive(Debug, Clone)]
pub struct PredictionRepository {
    pool: SqlitePool,
}

impl PredictionRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replaces the table contents with `predictions` in one transaction.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails; the previous
    /// contents are kept in that case.
    pub async fn replace_all(&self, predictions: &[ScoredPrediction]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM ipo_predictions")
            .execute(&mut *tx)
            .await?;

        for prediction in predictions {
            sqlx::query(
                r"
                INSERT INTO ipo_predictions
                    (offering_name, predicted_probability, gmp_pct, final_decision,
                     decision_label, predicted_at, listing_date, offer_price,
                     subscription_multiple, has_anchor_investor)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ",
            )
            .bind(&prediction.offering_name)
            .bind(prediction.predicted_probability)
            .bind(prediction.gmp_pct)
            .bind(prediction.final_decision)
            .bind(&prediction.decision_label)
            .bind(prediction.predicted_at)
            .bind(&prediction.listing_date)
            .bind(prediction.offer_price)
            .bind(prediction.subscription_multiple)
            .bind(prediction.has_anchor_investor)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(predictions.len())
    }

    /// Lists stored predictions, highest probability first.
    ///
    /// Rows with equal probability keep insertion order.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_by_probability(&self) -> Result<Vec<ScoredPrediction>> {
        let records = sqlx::query_as::<_, ScoredPrediction>(
            r"
            SELECT offering_name, predicted_probability, gmp_pct, final_decision,
                   decision_label, predicted_at, listing_date, offer_price,
                   subscription_multiple, has_anchor_investor
            FROM ipo_predictions
            ORDER BY predicted_probability DESC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Counts stored predictions.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ipo_predictions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Checks that the predictions table is reachable.
    ///
    /// # Errors
    /// Returns an error if the table cannot be queried.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1 FROM ipo_predictions LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(())
    }
}
