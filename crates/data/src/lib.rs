//! Data storage for the IPO advisor.
//!
//! This crate provides:
//! - `SQLite` database client with embedded migrations
//! - Data models for raw observations and scored predictions
//! - Repositories for typed database access

pub mod database;
pub mod models;
pub mod repositories;

pub use database::DatabaseClient;
pub use models::{RawNumber, RawObservation, ScoredPrediction};
pub use repositories::{
    ObservationKey, PredictionRepository, RawObservationRepository, Repositories,
};
