use axum::body::{to_bytes, Body};
use axum::http::Request;
use chrono::{TimeZone, Utc};
use ipo_advisor_core::AppConfig;
use ipo_advisor_data::{DatabaseClient, RawObservation, ScoredPrediction};
use ipo_advisor_pipeline::{run_scoring, Delivery, PipelineContext, RunOutcome, FEATURE_NAMES};
use ipo_advisor_web_api::{ApiServer, AppState};
use std::path::Path;
use std::process::Command;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Logistic model that leans on the anchor flag: p ~ 0.88 with an anchor, 0.5 without.
fn write_model(dir: &Path) -> String {
    let model_path = dir.join("ipo_model.json");
    let mut coefficients = vec![0.0; FEATURE_NAMES.len()];
    coefficients[6] = 2.0;
    let artifact = serde_json::json!({
        "kind": "logistic",
        "feature_names": FEATURE_NAMES,
        "intercept": 0.0,
        "coefficients": coefficients,
    });
    std::fs::write(&model_path, artifact.to_string()).unwrap();
    model_path.display().to_string()
}

fn config_for(dir: &Path, upload_url: Option<String>) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}", dir.join("ipo.db").display());
    config.model.path = write_model(dir);
    config.publisher.upload_url = upload_url;
    config.publisher.timeout_secs = 5;
    config
}

fn scraped_rows() -> Vec<RawObservation> {
    let at = Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap();
    vec![
        RawObservation::new("Acme Foods NSE SME O")
            .with_market("24", "88.1")
            .with_issue("120", "45", 1000)
            .with_listing("Feb 6, 2025\nNSE SME", false)
            .scraped_at(at),
        RawObservation::new("Bolt Motors BSE SME C")
            .with_market("9", "14")
            .with_issue("100", "30", 1200)
            .with_listing("Feb 7, 2025", true)
            .scraped_at(at),
        RawObservation::new("Crux Labs")
            .with_market("2", "1.1")
            .with_issue("50", "12", 2400)
            .with_listing("Feb 7, 2025", true)
            .scraped_at(at),
        RawObservation::new("Dyno Ltd L@210 (5.00%)")
            .with_market("10", "40")
            .with_issue("200", "80", 600)
            .with_listing("Jan 20, 2025", true)
            .scraped_at(at),
        RawObservation::new("Echo Retail")
            .with_market("5", "3")
            .with_issue("0", "10", 1000)
            .with_listing("Feb 9, 2025", false)
            .scraped_at(at),
    ]
}

async fn seed(config: &AppConfig) {
    let db = DatabaseClient::from_config(&config.database).await.unwrap();
    db.repositories()
        .raw
        .upsert_batch(&scraped_rows())
        .await
        .unwrap();
    db.close().await;
}

#[tokio::test]
async fn test_score_deliver_and_serve() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload_predictions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "success", "rows_updated": 3})),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        dir.path(),
        Some(format!("{}/upload_predictions", upstream.uri())),
    );
    seed(&config).await;

    let ctx = PipelineContext::from_config(&config).await.unwrap();
    let RunOutcome::Completed(report) = run_scoring(&ctx).await.unwrap() else {
        panic!("expected a completed run");
    };

    assert_eq!(report.selected, 5);
    assert_eq!(report.listed_filtered, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.scored(), 3);
    assert_eq!(report.delivery, Delivery::Delivered { rows: 3 });

    let picks: Vec<&str> = report
        .invest_picks()
        .iter()
        .map(|p| p.offering_name.as_str())
        .collect();
    assert_eq!(picks, vec!["Acme Foods NSE SME O", "Bolt Motors BSE SME C"]);

    // Listed and rejected rows stay unprocessed; scored rows are flagged.
    let repos = ctx.db.repositories();
    assert_eq!(repos.raw.count_unprocessed().await.unwrap(), 2);

    // The upload endpoint received the same batch that /today serves locally.
    let received: Vec<ScoredPrediction> =
        serde_json::from_slice(&upstream.received_requests().await.unwrap()[0].body).unwrap();
    assert_eq!(received, report.predictions);

    let router = ApiServer::new(AppState::new(repos)).router();
    let response = router
        .oneshot(Request::builder().uri("/today").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let today: Vec<ScoredPrediction> = serde_json::from_slice(&bytes).unwrap();

    let names: Vec<&str> = today.iter().map(|p| p.offering_name.as_str()).collect();
    assert_eq!(names, vec!["Bolt Motors", "Crux Labs", "Acme Foods"]);
    assert_eq!(today[2].listing_date, "Feb 6, 2025");
}

#[tokio::test]
async fn test_failed_delivery_is_retried_next_run() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload_predictions"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload_predictions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "success", "rows_updated": 3})),
        )
        .mount(&upstream)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        dir.path(),
        Some(format!("{}/upload_predictions", upstream.uri())),
    );
    seed(&config).await;
    let ctx = PipelineContext::from_config(&config).await.unwrap();

    let first = run_scoring(&ctx).await.unwrap();
    assert!(!first.is_success());
    assert_eq!(ctx.db.repositories().raw.count_unprocessed().await.unwrap(), 5);

    let second = run_scoring(&ctx).await.unwrap();
    assert!(second.is_success());
    assert_eq!(ctx.db.repositories().raw.count_unprocessed().await.unwrap(), 2);
}

#[test]
fn test_binary_exits_non_zero_when_delivery_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        dir.path(),
        Some("http://127.0.0.1:9/upload_predictions".to_string()),
    );

    let rows = dir.path().join("rows.json");
    std::fs::write(
        &rows,
        r#"[{"offering_name": "Acme Foods NSE SME O", "gmp": 24, "subscription_multiple": 88.1,
             "offer_price": 120, "offer_size": 45, "lot_size": 1000,
             "listing_date": "Feb 6, 2025", "has_anchor_investor": "✅"}]"#,
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_ipo-advisor"))
        .args(["--config", &dir.path().join("none.toml").display().to_string()])
        .args(["run", "--file", &rows.display().to_string()])
        .env("APP_DATABASE__URL", &config.database.url)
        .env("APP_MODEL__PATH", &config.model.path)
        .env("APP_PUBLISHER__UPLOAD_URL", "http://127.0.0.1:9/upload_predictions")
        .env("APP_PUBLISHER__TIMEOUT_SECS", "2")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Ingested 1 rows"));
    assert!(stdout.contains("Delivery FAILED"));
}

#[test]
fn test_binary_score_without_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), None);

    let output = Command::new(env!("CARGO_BIN_EXE_ipo-advisor"))
        .args(["--config", &dir.path().join("none.toml").display().to_string()])
        .arg("score")
        .env("APP_DATABASE__URL", &config.database.url)
        .env("APP_MODEL__PATH", &config.model.path)
        .env("RUST_LOG", "off")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(!dir.path().join("ipo.db").exists());
}
