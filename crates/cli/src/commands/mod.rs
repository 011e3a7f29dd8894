//! CLI commands for the IPO advisor.

pub mod ingest;
pub mod score;
pub mod serve;
pub mod today;

pub use ingest::{run_ingest, IngestArgs};
pub use score::{run_pipeline, run_score, RunArgs};
pub use serve::{run_serve, ServeArgs};
pub use today::run_today;
