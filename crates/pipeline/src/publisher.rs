//! Delivers scored predictions and advances the processed flag.
//!
//! Delivery is at-least-once: rows are flagged processed only after the
//! predictions store is written and, when configured, the remote upload
//! endpoint confirms. A failed delivery leaves every row unprocessed so the
//! next run scores it again.

use std::time::Duration;

use ipo_advisor_core::PublisherConfig;
use ipo_advisor_data::{ObservationKey, Repositories, ScoredPrediction};
use reqwest::Client;
use serde::Deserialize;

use crate::error::{PipelineError, PublishError};

/// Body returned by `POST /upload_predictions`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    status: String,
    #[serde(default)]
    rows_updated: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// How a batch was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the local predictions store, no remote endpoint configured.
    LocalOnly { rows: usize },
    /// Written locally and confirmed by the remote endpoint.
    Delivered { rows: u64 },
    /// Delivery failed; no rows were flagged processed.
    Failed { reason: String },
}

impl Delivery {
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Publishes prediction batches to the predictions store and upload endpoint.
#[derive(Debug, Clone)]
pub struct PredictionPublisher {
    http: Client,
    upload_url: Option<String>,
}

impl PredictionPublisher {
    /// Creates a publisher from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &PublisherConfig) -> Result<Self, PublishError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            upload_url: config.upload_url.clone(),
        })
    }

    /// Creates a publisher that only writes the local predictions store.
    #[must_use]
    pub fn local_only() -> Self {
        Self {
            http: Client::new(),
            upload_url: None,
        }
    }

    #[must_use]
    pub fn upload_url(&self) -> Option<&str> {
        self.upload_url.as_deref()
    }

    /// Sends a batch to the upload endpoint and returns the rows it accepted.
    ///
    /// The endpoint answers 200 for both outcomes, so the `status` field of
    /// the body decides success.
    ///
    /// # Errors
    /// Returns an error on network failure, a non-2xx status, an error
    /// payload, or an unreadable body.
    pub async fn transmit(&self, predictions: &[ScoredPrediction]) -> Result<u64, PublishError> {
        let Some(url) = self.upload_url.as_deref() else {
            return Err(PublishError::Configuration(
                "no upload_url configured".to_string(),
            ));
        };

        let response = self.http.post(url).json(predictions).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status_code: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Response(e.to_string()))?;

        if body.status != "success" {
            return Err(PublishError::Rejected(
                body.message.unwrap_or_else(|| body.status.clone()),
            ));
        }

        Ok(body.rows_updated.unwrap_or(predictions.len() as u64))
    }

    /// Stores the batch, uploads it when an endpoint is configured, then flags
    /// `keys` processed.
    ///
    /// A delivery failure is returned as [`Delivery::Failed`], not an error,
    /// and leaves the processed flags untouched.
    ///
    /// # Errors
    /// Returns an error only if marking rows processed fails after a
    /// successful delivery.
    pub async fn publish(
        &self,
        repos: &Repositories,
        predictions: &[ScoredPrediction],
        keys: &[ObservationKey],
    ) -> Result<Delivery, PipelineError> {
        let stored = match repos.predictions.replace_all(predictions).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to write predictions store: {:#}", e);
                return Ok(Delivery::Failed {
                    reason: format!("predictions store write failed: {e:#}"),
                });
            }
        };

        let delivery = match self.upload_url.as_deref() {
            None => Delivery::LocalOnly { rows: stored },
            Some(url) => match self.transmit(predictions).await {
                Ok(rows) => {
                    tracing::info!("Uploaded {} predictions to {}", rows, url);
                    Delivery::Delivered { rows }
                }
                Err(e) => {
                    tracing::warn!(
                        "Upload to {} failed (retryable: {}): {}",
                        url,
                        e.is_retryable(),
                        e
                    );
                    return Ok(Delivery::Failed {
                        reason: e.to_string(),
                    });
                }
            },
        };

        let marked = repos.raw.mark_processed(keys).await?;
        tracing::info!("Marked {} raw rows processed", marked);

        Ok(delivery)
    }
}
