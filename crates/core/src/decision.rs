//! Tiered INVEST/SKIP decision rules.
//!
//! A strong grey-market premium is taken at face value; a moderate premium
//! needs the classifier's agreement; anything weaker is skipped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// GMP percentage at or above which an offering is invested in outright.
pub const GMP_AUTO_INVEST: f64 = 15.0;

/// Lowest GMP percentage the classifier is consulted for.
pub const GMP_MIN: f64 = 5.0;

/// Minimum predicted probability for a model-gated INVEST.
pub const PROB_THRESHOLD: f64 = 0.70;

/// Final recommendation for an offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Invest,
    Skip,
}

impl Decision {
    /// Label persisted and served alongside the flag.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Invest => "INVEST",
            Self::Skip => "SKIP",
        }
    }

    /// Numeric flag: 1 for INVEST, 0 for SKIP.
    #[must_use]
    pub const fn flag(self) -> i64 {
        match self {
            Self::Invest => 1,
            Self::Skip => 0,
        }
    }

    #[must_use]
    pub const fn from_flag(flag: i64) -> Self {
        if flag == 1 {
            Self::Invest
        } else {
            Self::Skip
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The rule tier an offering fell into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTier {
    /// `gmp_pct >= GMP_AUTO_INVEST`.
    AutoInvest,
    /// `GMP_MIN <= gmp_pct < GMP_AUTO_INVEST` and `probability >= PROB_THRESHOLD`.
    ModelGated,
    /// Everything else.
    Rejected,
}

impl DecisionTier {
    #[must_use]
    pub const fn decision(self) -> Decision {
        match self {
            Self::AutoInvest | Self::ModelGated => Decision::Invest,
            Self::Rejected => Decision::Skip,
        }
    }
}

/// Classifies an offering into its rule tier. First matching tier wins.
///
/// NaN inputs fail every comparison and land in [`DecisionTier::Rejected`].
#[must_use]
pub fn evaluate(gmp_pct: f64, probability: f64) -> DecisionTier {
    if gmp_pct >= GMP_AUTO_INVEST {
        DecisionTier::AutoInvest
    } else if gmp_pct >= GMP_MIN && probability >= PROB_THRESHOLD {
        DecisionTier::ModelGated
    } else {
        DecisionTier::Rejected
    }
}

/// Decides INVEST or SKIP from the GMP percentage and model probability.
#[must_use]
pub fn decide(gmp_pct: f64, probability: f64) -> Decision {
    evaluate(gmp_pct, probability).decision()
}
