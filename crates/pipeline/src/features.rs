//! Feature derivation from raw observations.
//!
//! Turns scraped rows into the fixed seven-value vector the classifier was
//! trained on. Rows that cannot be turned into a valid vector are counted
//! and dropped; nothing here fails.

use ipo_advisor_data::RawObservation;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::LazyLock;

/// Number of values in a feature vector.
pub const FEATURE_COUNT: usize = 7;

/// Feature order the classifier was trained on.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "gmp_pct",
    "subscription_multiple",
    "log_subscription",
    "offer_size",
    "log_offer_size",
    "offer_price",
    "has_anchor_investor",
];

/// Post-listing markers: a listing price (`L@123`), a listing gain such as
/// `(12.5%)`, or an explicit `Listed`.
static NO_LONGER_TRADABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@|\(\s*[+-]?\d+(?:\.\d+)?\s*%\s*\)|Listed").expect("listing marker pattern is valid")
});

/// Returns true if the name shows the offering has already listed.
#[must_use]
pub fn is_no_longer_tradable(offering_name: &str) -> bool {
    NO_LONGER_TRADABLE.is_match(offering_name)
}

/// Feature values in [`FEATURE_NAMES`] order.
///
/// A missing subscription multiple is carried as NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    #[must_use]
    pub const fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn gmp_pct(&self) -> f64 {
        self.0[0]
    }
}

/// A derived row: the source observation plus its features.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub observation: RawObservation,
    pub gmp_pct: f64,
    pub offer_price: f64,
    pub subscription_multiple: Option<f64>,
    pub features: FeatureVector,
}

/// Output of [`derive_features`].
#[derive(Debug, Clone, Default)]
pub struct DerivedFeatures {
    pub rows: Vec<FeatureRow>,
    /// Rows dropped because the offering has already listed
    pub listed_filtered: usize,
    /// Rows dropped because gmp, offer price or offer size was not numeric,
    /// or the GMP percentage overflowed
    pub rejected_uncoercible: usize,
    /// Rows dropped because the offer price was zero or negative
    pub rejected_invalid_price: usize,
}

impl DerivedFeatures {
    /// Total rows rejected for data problems.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected_uncoercible + self.rejected_invalid_price
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Why a single observation produced no features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Uncoercible,
    InvalidPrice,
}

/// Derives features for every observation that is still tradable and valid.
#[must_use]
pub fn derive_features(observations: Vec<RawObservation>) -> DerivedFeatures {
    let mut derived = DerivedFeatures::default();

    for observation in observations {
        if is_no_longer_tradable(&observation.offering_name) {
            tracing::debug!("Skipping listed offering {}", observation.offering_name);
            derived.listed_filtered += 1;
            continue;
        }

        match derive_row(observation) {
            Ok(row) => derived.rows.push(row),
            Err(Rejection::Uncoercible) => derived.rejected_uncoercible += 1,
            Err(Rejection::InvalidPrice) => derived.rejected_invalid_price += 1,
        }
    }

    derived
}

fn derive_row(observation: RawObservation) -> Result<FeatureRow, Rejection> {
    let coerced = (
        observation.gmp.coerce(),
        observation.offer_price.coerce(),
        observation.offer_size.coerce(),
    );
    let (Some(gmp), Some(offer_price), Some(offer_size)) = coerced else {
        tracing::debug!(
            "Rejecting {}: non-numeric gmp/price/size ({:?}, {:?}, {:?})",
            observation.offering_name,
            observation.gmp.as_str(),
            observation.offer_price.as_str(),
            observation.offer_size.as_str()
        );
        return Err(Rejection::Uncoercible);
    };

    if offer_price <= Decimal::ZERO {
        tracing::debug!(
            "Rejecting {}: offer price {} is not positive",
            observation.offering_name,
            offer_price
        );
        return Err(Rejection::InvalidPrice);
    }

    let Some(gmp_pct) = gmp
        .checked_div(offer_price)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .and_then(|pct| pct.to_f64())
    else {
        tracing::debug!(
            "Rejecting {}: gmp {} over price {} is out of range",
            observation.offering_name,
            gmp,
            offer_price
        );
        return Err(Rejection::Uncoercible);
    };
    let offer_price = offer_price.to_f64().ok_or(Rejection::Uncoercible)?;
    let offer_size = offer_size.to_f64().ok_or(Rejection::Uncoercible)?;
    let subscription_multiple = observation
        .subscription_multiple
        .coerce()
        .and_then(|s| s.to_f64());
    let subscription = subscription_multiple.unwrap_or(f64::NAN);
    let anchor = if observation.has_anchor_investor { 1.0 } else { 0.0 };

    let features = FeatureVector::new([
        gmp_pct,
        subscription,
        subscription.ln_1p(),
        offer_size,
        offer_size.ln_1p(),
        offer_price,
        anchor,
    ]);

    Ok(FeatureRow {
        observation,
        gmp_pct,
        offer_price,
        subscription_multiple,
        features,
    })
}
