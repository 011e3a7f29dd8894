//! Ingest CLI command.
//!
//! Loads scraped rows from a JSON array or a CSV file and upserts them into
//! the raw observation store.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use ipo_advisor_core::AppConfig;
use ipo_advisor_data::{DatabaseClient, RawNumber, RawObservation};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Arguments for the ingest command.
#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// JSON or CSV file of scraped rows
    #[arg(short, long)]
    pub file: PathBuf,
}

/// One scraped row as it appears in an ingest file.
#[derive(Debug, Deserialize)]
struct ScrapedRecord {
    offering_name: String,
    gmp: RawNumber,
    #[serde(default)]
    subscription_multiple: RawNumber,
    offer_price: RawNumber,
    offer_size: RawNumber,
    #[serde(default)]
    lot_size: i64,
    #[serde(default)]
    listing_date: String,
    #[serde(default, deserialize_with = "deserialize_anchor")]
    has_anchor_investor: bool,
    #[serde(default)]
    scraped_at: Option<DateTime<Utc>>,
}

impl ScrapedRecord {
    fn into_observation(self, now: DateTime<Utc>) -> RawObservation {
        RawObservation::new(self.offering_name.trim())
            .with_market(self.gmp, self.subscription_multiple)
            .with_issue(self.offer_price, self.offer_size, self.lot_size)
            .with_listing(self.listing_date, self.has_anchor_investor)
            .scraped_at(self.scraped_at.unwrap_or(now))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnchorCell {
    Flag(bool),
    Number(i64),
    Text(String),
}

/// Parses the anchor column: a boolean, `1`/`0`, `yes`/`no`, or a check mark.
fn parse_anchor(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "✅" => Some(true),
        "0" | "false" | "no" | "n" | "" | "❌" => Some(false),
        _ => None,
    }
}

fn deserialize_anchor<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match AnchorCell::deserialize(deserializer)? {
        AnchorCell::Flag(flag) => Ok(flag),
        AnchorCell::Number(n) => Ok(n != 0),
        AnchorCell::Text(text) => parse_anchor(&text).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognized anchor value {text:?}"))
        }),
    }
}

/// Reads observations from `path`, choosing the format by extension.
///
/// Rows without `scraped_at` are stamped with `now`.
///
/// # Errors
/// Returns an error if the file cannot be read or a row is malformed.
pub fn read_observations(path: &Path, now: DateTime<Utc>) -> Result<Vec<RawObservation>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let records: Vec<ScrapedRecord> = if is_csv {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        reader
            .deserialize()
            .enumerate()
            .map(|(i, row)| row.with_context(|| format!("Malformed CSV row {}", i + 1)))
            .collect::<Result<_>>()?
    } else {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Malformed JSON in {}", path.display()))?
    };

    let mut observations = Vec::with_capacity(records.len());
    for record in records {
        if record.offering_name.trim().is_empty() {
            bail!("Row without offering_name in {}", path.display());
        }
        observations.push(record.into_observation(now));
    }

    Ok(observations)
}

/// Runs the ingest command and returns the number of rows upserted.
///
/// # Errors
/// Returns an error if the file cannot be parsed or the store write fails.
pub async fn run_ingest(config: &AppConfig, args: &IngestArgs) -> Result<usize> {
    let observations = read_observations(&args.file, Utc::now())?;
    tracing::info!(
        "Read {} rows from {}",
        observations.len(),
        args.file.display()
    );

    let db = DatabaseClient::from_config(&config.database)
        .await
        .map_err(|e| anyhow!("Failed to open store {}: {:#}", config.database.url, e))?;

    let written = db.repositories().raw.upsert_batch(&observations).await?;
    let pending = db.repositories().raw.count_unprocessed().await?;
    db.close().await;

    println!("Ingested {written} rows ({pending} awaiting scoring)");
    Ok(written)
}
