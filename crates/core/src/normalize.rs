//! Offering name normalization.
//!
//! Scraped offering names carry exchange, segment and listing-status noise,
//! e.g. `"Acme Foods NSE SME O"` or `"Acme Foods BSE SME LT"`. The canonical
//! identity is the name with that trailing noise removed.
//!
//! The noise vocabulary is closed: an exchange tag ([`ExchangeTag`]), an
//! optional SME segment marker, and a status code ([`StatusTag`]).

use regex::Regex;
use std::sync::LazyLock;

/// Exchange tags that may trail an offering name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeTag {
    Nse,
    Bse,
}

impl ExchangeTag {
    pub const ALL: [Self; 2] = [Self::Nse, Self::Bse];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Nse => "NSE",
            Self::Bse => "BSE",
        }
    }
}

/// Segment marker for small and medium enterprise listings.
pub const SME_MARKER: &str = "SME";

/// Listing-status codes that may trail an offering name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTag {
    /// `L`: listed.
    Listed,
    /// `C`: current, open for subscription.
    Current,
    /// `CT`: current tranche.
    CurrentTranche,
    /// `U`: upcoming, not yet listed.
    Unlisted,
    /// `LT`: listed tranche.
    ListedTranche,
    /// `O`: subscription closed, allotment pending.
    AllotmentOpen,
    /// `A`: allotted.
    Allotted,
    /// `AL`: allotted, listing pending.
    AllotmentListed,
}

impl StatusTag {
    pub const ALL: [Self; 8] = [
        Self::Listed,
        Self::Current,
        Self::CurrentTranche,
        Self::Unlisted,
        Self::ListedTranche,
        Self::AllotmentOpen,
        Self::Allotted,
        Self::AllotmentListed,
    ];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Listed => "L",
            Self::Current => "C",
            Self::CurrentTranche => "CT",
            Self::Unlisted => "U",
            Self::ListedTranche => "LT",
            Self::AllotmentOpen => "O",
            Self::Allotted => "A",
            Self::AllotmentListed => "AL",
        }
    }

    /// Parses a status code, ignoring case.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.code().eq_ignore_ascii_case(code))
    }
}

/// Alternation of codes, longest first so `CT` wins over `C`.
fn alternation(mut codes: Vec<&'static str>) -> String {
    codes.sort_by_key(|c| std::cmp::Reverse(c.len()));
    codes.join("|")
}

static EXCHANGE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    let exchanges = alternation(ExchangeTag::ALL.iter().map(|t| t.code()).collect());
    let statuses = alternation(StatusTag::ALL.iter().map(|t| t.code()).collect());
    Regex::new(&format!(
        r"(?i)\s+(?:{exchanges})(?:\s+{SME_MARKER})?(?:\s+(?:{statuses}))?\s*$"
    ))
    .expect("exchange suffix pattern is valid")
});

static STATUS_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    let statuses = alternation(StatusTag::ALL.iter().map(|t| t.code()).collect());
    Regex::new(&format!(r"(?i)\s+(?:{statuses})\s*$")).expect("status suffix pattern is valid")
});

/// One cleaning pass: drop an exchange suffix group, then a standalone status code.
fn strip_once(name: &str) -> &str {
    let name = name.trim();
    let name = match EXCHANGE_SUFFIX.find(name) {
        Some(m) => name[..m.start()].trim_end(),
        None => name,
    };
    match STATUS_SUFFIX.find(name) {
        Some(m) => name[..m.start()].trim_end(),
        None => name,
    }
}

/// Returns the canonical form of a scraped offering name.
///
/// Matching is case-insensitive and anchored to the end of the name; the
/// residual keeps its original casing. Passes repeat until nothing more is
/// stripped, so `normalize(&normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize(raw_name: &str) -> String {
    let mut current = raw_name.trim();
    loop {
        let next = strip_once(current);
        if next.len() == current.len() {
            return current.to_string();
        }
        current = next;
    }
}

/// Grouping key for deduplication: the normalized name, case-folded.
#[must_use]
pub fn canonical_key(raw_name: &str) -> String {
    normalize(raw_name).to_lowercase()
}
