//! Raw IPO observation model.
//!
//! One scrape of one offering at one point in time, as written by the
//! scraper and read by the scoring pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A numeric cell as scraped, kept as text until the pipeline coerces it.
///
/// Scraped cells can hold thousands separators, a currency sign, or
/// placeholders like `"--"`. Storing the text lets coercion failures be
/// detected and counted instead of silently becoming zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(from = "RawCell", into = "String")]
#[sqlx(transparent)]
pub struct RawNumber(String);

/// Accepts either a JSON string or a JSON number.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCell {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawCell> for RawNumber {
    fn from(cell: RawCell) -> Self {
        match cell {
            RawCell::Text(text) => Self(text),
            RawCell::Number(number) => Self(number.to_string()),
        }
    }
}

impl From<RawNumber> for String {
    fn from(value: RawNumber) -> Self {
        value.0
    }
}

impl RawNumber {
    /// Wraps scraped cell text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The text as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strict numeric coercion.
    ///
    /// Strips surrounding whitespace, thousands separators and a leading
    /// rupee sign, then parses a plain or scientific decimal. Returns `None`
    /// for anything else, including the empty string.
    #[must_use]
    pub fn coerce(&self) -> Option<Decimal> {
        let cleaned: String = self
            .0
            .trim()
            .trim_start_matches('₹')
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();

        if cleaned.is_empty() {
            return None;
        }

        Decimal::from_str(&cleaned)
            .or_else(|_| Decimal::from_scientific(&cleaned))
            .ok()
    }
}

impl From<Decimal> for RawNumber {
    fn from(value: Decimal) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RawNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A scraped IPO row, unique per `offering_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawObservation {
    /// Offering name as scraped, suffix noise included
    pub offering_name: String,
    /// Grey-market premium in currency units
    pub gmp: RawNumber,
    /// Subscription multiple (times subscribed)
    pub subscription_multiple: RawNumber,
    /// Offer price per share
    pub offer_price: RawNumber,
    /// Issue size in crore
    pub offer_size: RawNumber,
    /// Shares per lot
    pub lot_size: i64,
    /// Listing date text; only the first line is meaningful
    pub listing_date: String,
    /// Whether anchor investors participated
    pub has_anchor_investor: bool,
    /// When the row was last scraped
    pub scraped_at: DateTime<Utc>,
    /// Set once the row has been scored and delivered
    #[serde(default)]
    pub is_processed: bool,
}

impl RawObservation {
    /// Creates an unprocessed observation scraped now with empty numeric cells.
    pub fn new(offering_name: impl Into<String>) -> Self {
        Self {
            offering_name: offering_name.into(),
            gmp: RawNumber::default(),
            subscription_multiple: RawNumber::default(),
            offer_price: RawNumber::default(),
            offer_size: RawNumber::default(),
            lot_size: 0,
            listing_date: String::new(),
            has_anchor_investor: false,
            scraped_at: Utc::now(),
            is_processed: false,
        }
    }

    /// Sets the market indicator cells.
    #[must_use]
    pub fn with_market(
        mut self,
        gmp: impl Into<RawNumber>,
        subscription_multiple: impl Into<RawNumber>,
    ) -> Self {
        self.gmp = gmp.into();
        self.subscription_multiple = subscription_multiple.into();
        self
    }

    /// Sets the issue terms.
    #[must_use]
    pub fn with_issue(
        mut self,
        offer_price: impl Into<RawNumber>,
        offer_size: impl Into<RawNumber>,
        lot_size: i64,
    ) -> Self {
        self.offer_price = offer_price.into();
        self.offer_size = offer_size.into();
        self.lot_size = lot_size;
        self
    }

    /// Sets the listing date text and anchor participation.
    #[must_use]
    pub fn with_listing(mut self, listing_date: impl Into<String>, has_anchor_investor: bool) -> Self {
        self.listing_date = listing_date.into();
        self.has_anchor_investor = has_anchor_investor;
        self
    }

    #[must_use]
    pub fn scraped_at(mut self, scraped_at: DateTime<Utc>) -> Self {
        self.scraped_at = scraped_at;
        self
    }
}
