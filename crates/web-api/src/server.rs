use crate::handlers::{self, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use ipo_advisor_data::DatabaseClient;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Opens the existing store at `database_url` and builds a server on it.
    ///
    /// The store is never created here. If it is missing or cannot be opened
    /// the server still starts; `/today` and `/upload_predictions` then report
    /// the store as unavailable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Self {
        match DatabaseClient::open_existing(database_url, max_connections).await {
            Ok(db) => Self::new(AppState::new(db.repositories())),
            Err(e) => {
                tracing::warn!("Predictions store unavailable at {}: {:#}", database_url, e);
                Self::new(AppState::without_store())
            }
        }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(handlers::status))
            .route("/today", get(handlers::today))
            .route("/upload_predictions", post(handlers::upload_predictions))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use ipo_advisor_core::Decision;
    use ipo_advisor_data::ScoredPrediction;
    use tower::ServiceExt;

    async fn call(router: Router, request: Request<Body>) -> serde_json::Value {
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn server_with_store() -> ApiServer {
        let db = DatabaseClient::in_memory().await.unwrap();
        ApiServer::new(AppState::new(db.repositories()))
    }

    fn batch() -> Vec<ScoredPrediction> {
        let at = Utc.with_ymd_and_hms(2025, 2, 3, 6, 0, 0).unwrap();
        vec![
            ScoredPrediction::new("Acme Foods NSE SME O", 0.81, 12.0, Decision::Invest, at)
                .with_display("Feb 7, 2025\nNSE SME", 95.0, Some(120.5), true),
            ScoredPrediction::new("Bolt Motors BSE SME C", 0.33, 3.0, Decision::Skip, at)
                .with_display("Feb 8, 2025", 40.0, None, false),
        ]
    }

    #[tokio::test]
    async fn test_status_reports_store() {
        let server = server_with_store().await;
        let body = call(server.router(), get("/")).await;
        assert_eq!(body["status"], "running");
        assert_eq!(body["store_available"], true);

        let bare = ApiServer::new(AppState::without_store());
        let body = call(bare.router(), get("/")).await;
        assert_eq!(body["store_available"], false);
    }

    #[tokio::test]
    async fn test_connect_does_not_create_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("absent.db");
        let url = format!("sqlite://{}", db_path.display());

        let server = ApiServer::connect(&url, 1).await;
        let body = call(server.router(), get("/")).await;
        assert_eq!(body["store_available"], false);

        let body = call(server.router(), get("/today")).await;
        assert!(body["error"].is_string());
        assert!(!db_path.exists());
    }

    #[tokio::test]
    async fn test_connect_opens_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ipo.db").display());
        DatabaseClient::connect(&url, 1).await.unwrap().close().await;

        let server = ApiServer::connect(&url, 1).await;
        let body = call(server.router(), get("/")).await;
        assert_eq!(body["store_available"], true);
    }

    #[tokio::test]
    async fn test_today_without_store_is_error_payload() {
        let server = ApiServer::new(AppState::without_store());
        let body = call(server.router(), get("/today")).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_today_on_empty_store() {
        let server = server_with_store().await;
        let body = call(server.router(), get("/today")).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_upload_then_today_round_trip() {
        let server = server_with_store().await;
        let sent = batch();

        let body = call(
            server.router(),
            post_json("/upload_predictions", serde_json::to_string(&sent).unwrap()),
        )
        .await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["rows_updated"], 2);

        let body = call(server.router(), get("/today")).await;
        let received: Vec<ScoredPrediction> = serde_json::from_value(body).unwrap();
        assert_eq!(received.len(), 2);

        let acme = &received[0];
        assert_eq!(acme.offering_name, "Acme Foods");
        assert_eq!(acme.listing_date, "Feb 7, 2025");
        assert_eq!(acme.predicted_probability, sent[0].predicted_probability);
        assert_eq!(acme.gmp_pct, sent[0].gmp_pct);
        assert_eq!(acme.decision(), Decision::Invest);
        assert_eq!(acme.decision_label, "INVEST");
        assert_eq!(acme.predicted_at, sent[0].predicted_at);
        assert_eq!(acme.offer_price, 95.0);
        assert_eq!(acme.subscription_multiple, Some(120.5));
        assert!(acme.has_anchor_investor);

        let bolt = &received[1];
        assert_eq!(bolt.offering_name, "Bolt Motors");
        assert_eq!(bolt.subscription_multiple, None);
    }

    #[tokio::test]
    async fn test_upload_replaces_previous_batch() {
        let server = server_with_store().await;
        let first = serde_json::to_string(&batch()).unwrap();
        call(server.router(), post_json("/upload_predictions", first)).await;

        let second = serde_json::to_string(&batch()[1..]).unwrap();
        let body = call(server.router(), post_json("/upload_predictions", second)).await;
        assert_eq!(body["rows_updated"], 1);

        let body = call(server.router(), get("/today")).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_invalid_rows_reject_whole_batch() {
        let server = server_with_store().await;
        let first = serde_json::to_string(&batch()).unwrap();
        call(server.router(), post_json("/upload_predictions", first)).await;

        let mut out_of_range = batch();
        out_of_range[1].predicted_probability = 1.7;
        let body = call(
            server.router(),
            post_json("/upload_predictions", serde_json::to_string(&out_of_range).unwrap()),
        )
        .await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("Bolt Motors"));

        let mut mismatched = batch();
        mismatched[0].decision_label = "SKIP".to_string();
        let body = call(
            server.router(),
            post_json("/upload_predictions", serde_json::to_string(&mismatched).unwrap()),
        )
        .await;
        assert_eq!(body["status"], "error");

        // The earlier valid batch is still served.
        let body = call(server.router(), get("/today")).await;
        assert_eq!(body.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_malformed_upload_is_error_payload() {
        let server = server_with_store().await;
        let body = call(
            server.router(),
            post_json("/upload_predictions", r#"{"not": "a list"}"#.to_string()),
        )
        .await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].is_string());
    }
}
