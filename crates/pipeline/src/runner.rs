//! End-to-end scoring run.
//!
//! Selects unprocessed observations, derives features, scores them, applies
//! the decision rules and publishes the batch. One run produces at most one
//! published batch.

use chrono::{DateTime, Utc};
use ipo_advisor_core::{decide, AppConfig};
use ipo_advisor_data::{DatabaseClient, ObservationKey, ScoredPrediction};

use crate::error::{PipelineError, Result};
use crate::features::{derive_features, FeatureVector};
use crate::publisher::{Delivery, PredictionPublisher};
use crate::scorer::Scorer;

/// Everything a scoring run needs.
pub struct PipelineContext {
    pub db: DatabaseClient,
    pub scorer: Scorer,
    pub publisher: PredictionPublisher,
}

impl PipelineContext {
    #[must_use]
    pub fn new(db: DatabaseClient, scorer: Scorer, publisher: PredictionPublisher) -> Self {
        Self {
            db,
            scorer,
            publisher,
        }
    }

    /// Builds a context from configuration.
    ///
    /// The model is loaded first so a bad artifact fails before any store work.
    /// The store must already exist.
    ///
    /// # Errors
    /// Returns an error if the model cannot be loaded, the store is missing,
    /// or the publisher cannot be configured.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let scorer = Scorer::from_path(&config.model.path)?;

        let db = DatabaseClient::open_existing(&config.database.url, config.database.max_connections)
            .await
            .map_err(|e| PipelineError::Configuration(format!("{e:#}")))?;

        let publisher = PredictionPublisher::new(&config.publisher)?;

        Ok(Self::new(db, scorer, publisher))
    }
}

/// Counts and picks from a run that published a batch.
#[derive(Debug, Clone)]
pub struct ScoringReport {
    pub run_at: DateTime<Utc>,
    pub selected: usize,
    pub listed_filtered: usize,
    pub rejected: usize,
    pub predictions: Vec<ScoredPrediction>,
    pub delivery: Delivery,
}

impl ScoringReport {
    #[must_use]
    pub fn scored(&self) -> usize {
        self.predictions.len()
    }

    #[must_use]
    pub fn invest_count(&self) -> usize {
        self.predictions.iter().filter(|p| p.is_invest()).count()
    }

    /// INVEST predictions, highest GMP first, then highest probability.
    #[must_use]
    pub fn invest_picks(&self) -> Vec<&ScoredPrediction> {
        let mut picks: Vec<&ScoredPrediction> =
            self.predictions.iter().filter(|p| p.is_invest()).collect();
        picks.sort_by(|a, b| {
            b.gmp_pct
                .total_cmp(&a.gmp_pct)
                .then(b.predicted_probability.total_cmp(&a.predicted_probability))
        });
        picks
    }
}

/// Result of a scoring run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Nothing left to score after selection and filtering; nothing published.
    NothingToDo {
        selected: usize,
        listed_filtered: usize,
        rejected: usize,
    },
    Completed(ScoringReport),
}

impl RunOutcome {
    /// False only when a batch was produced but could not be delivered.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::NothingToDo { .. } => true,
            Self::Completed(report) => report.delivery.is_success(),
        }
    }
}

/// Runs one scoring pass over the unprocessed observations.
///
/// # Errors
/// Returns an error if the store cannot be read or written. Delivery
/// failures are reported through the outcome instead.
pub async fn run_scoring(ctx: &PipelineContext) -> Result<RunOutcome> {
    run_scoring_at(ctx, Utc::now()).await
}

/// Same as [`run_scoring`] with an explicit run timestamp.
///
/// # Errors
/// See [`run_scoring`].
pub async fn run_scoring_at(ctx: &PipelineContext, run_at: DateTime<Utc>) -> Result<RunOutcome> {
    let repos = ctx.db.repositories();

    let observations = repos.raw.list_unprocessed().await?;
    let selected = observations.len();
    tracing::info!("Selected {} unprocessed observations", selected);

    let derived = derive_features(observations);
    let listed_filtered = derived.listed_filtered;
    let rejected = derived.rejected();
    if rejected > 0 {
        tracing::warn!(
            "Rejected {} observations ({} non-numeric, {} invalid price)",
            rejected,
            derived.rejected_uncoercible,
            derived.rejected_invalid_price
        );
    }

    if derived.is_empty() {
        tracing::info!(
            "No rows to score ({} listed, {} rejected)",
            listed_filtered,
            rejected
        );
        return Ok(RunOutcome::NothingToDo {
            selected,
            listed_filtered,
            rejected,
        });
    }

    let vectors: Vec<FeatureVector> = derived.rows.iter().map(|row| row.features).collect();
    let probabilities = ctx.scorer.score(&vectors);

    let mut predictions = Vec::with_capacity(derived.rows.len());
    let mut keys = Vec::with_capacity(derived.rows.len());
    for (row, probability) in derived.rows.iter().zip(probabilities) {
        let decision = decide(row.gmp_pct, probability);
        let observation = &row.observation;
        tracing::debug!(
            "{}: gmp {:.2}% p={:.3} -> {}",
            observation.offering_name,
            row.gmp_pct,
            probability,
            decision
        );

        predictions.push(
            ScoredPrediction::new(
                observation.offering_name.clone(),
                probability,
                row.gmp_pct,
                decision,
                run_at,
            )
            .with_display(
                observation.listing_date.clone(),
                row.offer_price,
                row.subscription_multiple,
                observation.has_anchor_investor,
            ),
        );
        keys.push(ObservationKey::from(observation));
    }

    let delivery = ctx.publisher.publish(&repos, &predictions, &keys).await?;

    let report = ScoringReport {
        run_at,
        selected,
        listed_filtered,
        rejected,
        predictions,
        delivery,
    };
    tracing::info!(
        "Scored {} observations, {} INVEST",
        report.scored(),
        report.invest_count()
    );

    Ok(RunOutcome::Completed(report))
}
