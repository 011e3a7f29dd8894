//! Prints the deduplicated predictions, as `GET /today` serves them.

use anyhow::{anyhow, Result};
use ipo_advisor_core::AppConfig;
use ipo_advisor_data::{DatabaseClient, ScoredPrediction};
use ipo_advisor_web_api::present;

/// Runs the today command.
///
/// # Errors
/// Returns an error if the store is missing or cannot be read.
pub async fn run_today(config: &AppConfig) -> Result<Vec<ScoredPrediction>> {
    let db = DatabaseClient::open_existing(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| anyhow!("Predictions store unavailable: {:#}", e))?;

    let rows = db.repositories().predictions.list_by_probability().await;
    db.close().await;
    let predictions = present(rows?);

    if predictions.is_empty() {
        println!("No predictions stored yet.");
        return Ok(predictions);
    }

    println!(
        "{:<36} {:>7} {:>8} {:>9} {:>9} {:>6}  {}",
        "Offering", "Call", "P(gain)", "GMP %", "Price", "Anchor", "Listing"
    );
    println!("{}", "-".repeat(96));
    for p in &predictions {
        println!(
            "{:<36} {:>7} {:>8.3} {:>9.2} {:>9.2} {:>6}  {}",
            p.offering_name,
            p.decision_label,
            p.predicted_probability,
            p.gmp_pct,
            p.offer_price,
            if p.has_anchor_investor { "yes" } else { "no" },
            p.listing_date
        );
    }

    Ok(predictions)
}
