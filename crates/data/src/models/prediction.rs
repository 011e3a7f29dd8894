//! Scored prediction model.
//!
//! One row per offering per scoring run. This is also the wire shape of
//! `POST /upload_predictions` and `GET /today`.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use ipo_advisor_core::Decision;
use serde::{Deserialize, Serialize};

/// Classifier output plus the tiered decision for one offering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScoredPrediction {
    pub offering_name: String,
    /// Classifier probability in [0, 1]
    pub predicted_probability: f64,
    /// Grey-market premium as a percentage of the offer price
    pub gmp_pct: f64,
    /// 1 for INVEST, 0 for SKIP
    pub final_decision: i64,
    /// "INVEST" or "SKIP"
    pub decision_label: String,
    pub predicted_at: DateTime<Utc>,
    #[serde(default)]
    pub listing_date: String,
    #[serde(default)]
    pub offer_price: f64,
    /// Missing when the scraped cell was not numeric
    #[serde(default)]
    pub subscription_multiple: Option<f64>,
    #[serde(default)]
    pub has_anchor_investor: bool,
}

impl ScoredPrediction {
    /// Creates a prediction whose flag and label agree with `decision`.
    pub fn new(
        offering_name: impl Into<String>,
        predicted_probability: f64,
        gmp_pct: f64,
        decision: Decision,
        predicted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            offering_name: offering_name.into(),
            predicted_probability,
            gmp_pct,
            final_decision: decision.flag(),
            decision_label: decision.label().to_string(),
            predicted_at,
            listing_date: String::new(),
            offer_price: 0.0,
            subscription_multiple: None,
            has_anchor_investor: false,
        }
    }

    /// Adds the display passthrough fields.
    #[must_use]
    pub fn with_display(
        mut self,
        listing_date: impl Into<String>,
        offer_price: f64,
        subscription_multiple: Option<f64>,
        has_anchor_investor: bool,
    ) -> Self {
        self.listing_date = listing_date.into();
        self.offer_price = offer_price;
        self.subscription_multiple = subscription_multiple;
        self.has_anchor_investor = has_anchor_investor;
        self
    }

    /// Checks a prediction received from outside the pipeline.
    ///
    /// The probability must lie in `[0, 1]`, the flag must be 0 or 1, and
    /// the label must match the flag.
    ///
    /// # Errors
    /// Returns an error naming the offering and the broken field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.predicted_probability) {
            bail!(
                "{}: predicted_probability {} is outside [0, 1]",
                self.offering_name,
                self.predicted_probability
            );
        }
        if self.final_decision != 0 && self.final_decision != 1 {
            bail!(
                "{}: final_decision must be 0 or 1, got {}",
                self.offering_name,
                self.final_decision
            );
        }
        let expected = self.decision().label();
        if self.decision_label != expected {
            bail!(
                "{}: decision_label {:?} does not match final_decision {} ({})",
                self.offering_name,
                self.decision_label,
                self.final_decision,
                expected
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn decision(&self) -> Decision {
        Decision::from_flag(self.final_decision)
    }

    #[must_use]
    pub fn is_invest(&self) -> bool {
        self.decision() == Decision::Invest
    }
}
