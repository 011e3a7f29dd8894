//! HTTP handlers.
//!
//! Every endpoint answers HTTP 200; failures are reported in the JSON body.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use ipo_advisor_data::{Repositories, ScoredPrediction};
use serde::{Deserialize, Serialize};

use crate::presentation::present;

/// Shared handler state. `store` is `None` when the database could not be opened.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub store: Option<Repositories>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Repositories) -> Self {
        Self { store: Some(store) }
    }

    /// State for a server running without a predictions store.
    #[must_use]
    pub fn without_store() -> Self {
        Self::default()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub store_available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of `GET /today`: the predictions, or an error object.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TodayResponse {
    Predictions(Vec<ScoredPrediction>),
    Error(ErrorResponse),
}

/// Body of `POST /upload_predictions`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadResponse {
    Success { rows_updated: usize },
    Error { message: String },
}

/// GET / - service status.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let store_available = match &state.store {
        Some(store) => store.predictions.ping().await.is_ok(),
        None => false,
    };

    Json(StatusResponse {
        status: "running".to_string(),
        store_available,
    })
}

/// GET /today - deduplicated predictions, highest probability first.
pub async fn today(State(state): State<AppState>) -> Json<TodayResponse> {
    let Some(store) = &state.store else {
        return Json(TodayResponse::Error(ErrorResponse {
            error: "predictions store is not available".to_string(),
        }));
    };

    match store.predictions.list_by_probability().await {
        Ok(rows) => Json(TodayResponse::Predictions(present(rows))),
        Err(e) => {
            tracing::error!("Failed to read predictions: {:#}", e);
            Json(TodayResponse::Error(ErrorResponse {
                error: format!("{e:#}"),
            }))
        }
    }
}

/// POST /upload_predictions - replaces the stored predictions with the batch.
///
/// A batch containing any invalid row is rejected whole and the store is left as is.
pub async fn upload_predictions(
    State(state): State<AppState>,
    payload: Result<Json<Vec<ScoredPrediction>>, JsonRejection>,
) -> Json<UploadResponse> {
    let predictions = match payload {
        Ok(Json(predictions)) => predictions,
        Err(rejection) => {
            tracing::warn!("Rejected upload: {}", rejection.body_text());
            return Json(UploadResponse::Error {
                message: rejection.body_text(),
            });
        }
    };

    if let Err(e) = predictions.iter().try_for_each(ScoredPrediction::validate) {
        tracing::warn!("Rejected upload: {:#}", e);
        return Json(UploadResponse::Error {
            message: format!("{e:#}"),
        });
    }

    let Some(store) = &state.store else {
        return Json(UploadResponse::Error {
            message: "predictions store is not available".to_string(),
        });
    };

    match store.predictions.replace_all(&predictions).await {
        Ok(rows_updated) => {
            tracing::info!("Stored {} uploaded predictions", rows_updated);
            Json(UploadResponse::Success { rows_updated })
        }
        Err(e) => {
            tracing::error!("Failed to store uploaded predictions: {:#}", e);
            Json(UploadResponse::Error {
                message: format!("{e:#}"),
            })
        }
    }
}
