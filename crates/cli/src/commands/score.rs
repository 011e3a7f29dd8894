//! Score and run CLI commands.

use anyhow::{bail, Result};
use clap::Args;
use ipo_advisor_core::AppConfig;
use ipo_advisor_pipeline::{run_scoring, Delivery, PipelineContext, RunOutcome, ScoringReport};
use std::path::PathBuf;

use super::ingest::{run_ingest, IngestArgs};

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Scraped rows to ingest before scoring
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

/// Scores all unprocessed rows and publishes the batch.
///
/// # Errors
/// Returns an error on configuration or store failures, and after printing
/// the summary when the batch could not be delivered.
pub async fn run_score(config: &AppConfig) -> Result<RunOutcome> {
    let ctx = PipelineContext::from_config(config).await?;
    let outcome = run_scoring(&ctx).await;
    ctx.db.close().await;
    let outcome = outcome?;

    print_outcome(&outcome);

    if let RunOutcome::Completed(ScoringReport {
        delivery: Delivery::Failed { reason },
        ..
    }) = &outcome
    {
        bail!("Delivery failed, rows left unprocessed for the next run: {reason}");
    }

    Ok(outcome)
}

/// Ingests the optional file, then scores. Stops at the first failing step.
///
/// # Errors
/// Returns the error of the first step that fails.
pub async fn run_pipeline(config: &AppConfig, args: &RunArgs) -> Result<RunOutcome> {
    if let Some(file) = &args.file {
        run_ingest(config, &IngestArgs { file: file.clone() }).await?;
    }
    run_score(config).await
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::NothingToDo {
            selected,
            listed_filtered,
            rejected,
        } => {
            println!(
                "Nothing to score: {selected} selected, {listed_filtered} already listed, {rejected} rejected"
            );
        }
        RunOutcome::Completed(report) => print_report(report),
    }
}

fn print_report(report: &ScoringReport) {
    println!("\n=== Scoring run {} ===", report.run_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "Selected {} | listed {} | rejected {} | scored {} | INVEST {}",
        report.selected,
        report.listed_filtered,
        report.rejected,
        report.scored(),
        report.invest_count()
    );

    match &report.delivery {
        Delivery::LocalOnly { rows } => println!("Stored {rows} predictions locally"),
        Delivery::Delivered { rows } => println!("Delivered {rows} predictions downstream"),
        Delivery::Failed { reason } => println!("Delivery FAILED: {reason}"),
    }

    let picks = report.invest_picks();
    if picks.is_empty() {
        println!("\nNo INVEST picks this run.");
        return;
    }

    println!("\n{:<40} {:>8} {:>8}", "INVEST picks", "GMP %", "P(gain)");
    println!("{}", "-".repeat(58));
    for pick in picks {
        println!(
            "{:<40} {:>8.2} {:>8.3}",
            pick.offering_name, pick.gmp_pct, pick.predicted_probability
        );
    }
}
