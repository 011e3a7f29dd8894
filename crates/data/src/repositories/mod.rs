//! Database repositories for the IPO advisor.
//!
//! Each repository provides typed access to one table.

pub mod prediction_repo;
pub mod raw_observation_repo;

pub use prediction_repo::PredictionRepository;
pub use raw_observation_repo::{ObservationKey, RawObservationRepository};

use sqlx::SqlitePool;

/// Creates all repositories from a single database pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub raw: RawObservationRepository,
    pub predictions: PredictionRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            raw: RawObservationRepository::new(pool.clone()),
            predictions: PredictionRepository::new(pool),
        }
    }
}
