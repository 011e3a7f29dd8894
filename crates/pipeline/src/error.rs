//! Error types for the scoring pipeline.
//!
//! Configuration problems are fatal for a run. Delivery problems are not:
//! they are reported in the run outcome and the rows are retried next run.

use thiserror::Error;

/// Errors loading or applying the trained classifier.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The artifact file could not be read.
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        /// Artifact path.
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The artifact is not valid JSON for any known model kind.
    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        /// Artifact path.
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The artifact is internally inconsistent.
    #[error("invalid model artifact: {0}")]
    Invalid(String),

    /// The model was trained on a different feature layout.
    #[error("feature schema mismatch: expected {expected:?}, model has {actual:?}")]
    SchemaMismatch {
        /// Feature order produced by the deriver.
        expected: Vec<String>,
        /// Feature order the model was trained on.
        actual: Vec<String>,
    },
}

/// Errors delivering predictions to the downstream API.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Building the HTTP client failed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection, timeout or body transfer failure.
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("upload rejected with HTTP {status_code}: {body}")]
    Status {
        /// HTTP status code.
        status_code: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The endpoint answered 200 but reported an error in its payload.
    #[error("upload reported error: {0}")]
    Rejected(String),

    /// The response body could not be understood.
    #[error("unexpected upload response: {0}")]
    Response(String),
}

impl PublishError {
    /// Returns true if the same batch may succeed on a later attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Response(_) | Self::Rejected(_) => true,
            Self::Status { status_code, .. } => *status_code >= 500 || *status_code == 429,
            Self::Configuration(_) => false,
        }
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Configuration(err.to_string())
        } else if err.is_decode() {
            Self::Response(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Fatal errors that abort a scoring run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing store, unusable settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Classifier could not be loaded or applied.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A store read or write failed mid-run.
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),

    /// The publisher could not be set up.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_retryable() {
        assert!(PublishError::Network("reset".into()).is_retryable());
        assert!(PublishError::Status {
            status_code: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(PublishError::Status {
            status_code: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(!PublishError::Status {
            status_code: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!PublishError::Configuration("bad url".into()).is_retryable());
    }

    #[test]
    fn test_schema_mismatch_message() {
        let err = ModelError::SchemaMismatch {
            expected: vec!["a".into(), "b".into()],
            actual: vec!["b".into(), "a".into()],
        };
        assert!(err.to_string().contains("feature schema mismatch"));
    }

    #[test]
    fn test_model_error_converts_to_pipeline_error() {
        let err: PipelineError = ModelError::Invalid("no trees".into()).into();
        assert!(matches!(err, PipelineError::Model(_)));
        assert_eq!(err.to_string(), "invalid model artifact: no trees");
    }
}
