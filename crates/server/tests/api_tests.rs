//! API tests for ingestion, listing, dashboard and export endpoints
//!
//! Every request goes through the real router against an in-memory store,
//! with the clock pinned so SLA statuses are deterministic.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use incident_ingest::{IncidentStore, IngestConfig, IngestPipeline};
use incident_server::{api_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

const DESCRIPTIVE: &str = "Exibir ID,Descrição,Data de criação,Nome do grupo designado\n\
INC-1,\"Tipo da falha: Timeout de conexão\",17 de dez. de 2025 14:46:02,TCLOUD-DEVOPS-PROTHEUS\n\
INC-2,Sem rótulo,19 de dez. de 2025 09:00:00,Service Desk\n";

const TICKETING: &str = "Número;Assunto;Data Hora de Abertura;Resolver até;Equipe Responsável\n\
T-1;Rede - lenta;19/12/2025 08:00:00;19/12/2025 18:00:00;TCLOUD-DEVOPS-PROTHEUS\n";

fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 12, 19)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn app_with(config: IngestConfig) -> Router {
    let store = IncidentStore::open_in_memory().unwrap();
    let pipeline = IngestPipeline::new(config).unwrap();
    api_router(AppState::new(store, pipeline).with_clock(fixed_now))
}

fn app() -> Router {
    app_with(IngestConfig::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_ingest(app: &Router, descriptive: &str, ticketing: &str) -> (StatusCode, Value) {
    let payload = json!({ "descriptive_csv": descriptive, "ticketing_csv": ticketing });
    let (status, body) = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/ingest")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_reports_incident_count() {
    let app = app();
    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["incidents"], 0);
}

#[tokio::test]
async fn test_ingest_then_list() {
    let app = app();
    let (status, json) = post_ingest(&app, DESCRIPTIVE, TICKETING).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["summary"]["total"], 3);
    assert_eq!(json["data"]["upsert"]["written"], 3);

    let (status, json) = get_json(&app, "/api/incidents").await;
    assert_eq!(status, StatusCode::OK);
    let incidents = json["data"].as_array().unwrap();
    let ids: Vec<&str> = incidents.iter().map(|i| i["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["INC-2", "T-1", "INC-1"]);

    let inc1 = &incidents[2];
    assert_eq!(inc1["failure_type"], "Timeout de conexão");
    assert_eq!(inc1["sla_status"], "overdue");
    assert_eq!(incidents[1]["sla_status"], "on_time");
    assert_eq!(incidents[0]["failure_type"], "Unidentified");
}

#[tokio::test]
async fn test_ingest_twice_keeps_one_row_per_id() {
    let app = app();
    post_ingest(&app, DESCRIPTIVE, TICKETING).await;
    post_ingest(&app, DESCRIPTIVE, TICKETING).await;
    let (_, json) = get_json(&app, "/health").await;
    assert_eq!(json["data"]["incidents"], 3);
}

#[tokio::test]
async fn test_schema_error_is_unprocessable_with_reports() {
    let app = app();
    let (status, json) = post_ingest(&app, "Foo,Bar\n1,2\n", "Assunto;Data Hora de Abertura\nx;y\n").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["success"], false);

    let reports = json["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["code"], "schema_validation");
    assert_eq!(reports[0]["origin"], "descriptive");
    assert_eq!(reports[1]["origin"], "ticketing");
    assert_eq!(reports[1]["fields"], json!(["ID"]));

    let (_, health) = get_json(&app, "/health").await;
    assert_eq!(health["data"]["incidents"], 0);
}

#[tokio::test]
async fn test_empty_source_is_bad_request() {
    let app = app();
    let (status, json) = post_ingest(&app, DESCRIPTIVE, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["reports"][0]["code"], "source_read");
}

#[tokio::test]
async fn test_incident_filters() {
    let app = app();
    post_ingest(&app, DESCRIPTIVE, TICKETING).await;

    let (_, json) = get_json(&app, "/api/incidents?origin=ticketing").await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let (_, json) = get_json(&app, "/api/incidents?sector=Service%20Desk&sector=TCLOUD-DEVOPS-PROTHEUS&origin=descriptive").await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let (status, _) = get_json(&app, "/api/incidents?origin=email").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sector_name_with_comma_is_selectable() {
    let app = app();
    let descriptive = "Exibir ID,Descrição,Data de criação,Nome do grupo designado\n\
INC-9,x,18/12/2025 10:00:00,\"Infra, Redes\"\n";
    let (status, _) = post_ingest(&app, descriptive, TICKETING).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = get_json(&app, "/api/incidents?sector=Infra%2C%20Redes").await;
    let incidents = json["data"].as_array().unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0]["id"], "INC-9");
}

#[tokio::test]
async fn test_dashboard_defaults_to_preferred_sectors() {
    let config = IngestConfig {
        preferred_sectors: vec!["TCLOUD-DEVOPS-PROTHEUS".to_string()],
        ..IngestConfig::default()
    };
    let app = app_with(config);
    post_ingest(&app, DESCRIPTIVE, TICKETING).await;

    let (status, json) = get_json(&app, "/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["summary"]["total"], 2);
    assert_eq!(data["summary"]["overdue"], 1);
    assert_eq!(data["summary"]["on_time"], 1);
    assert_eq!(data["sectors"].as_array().unwrap().len(), 2);

    let (_, json) = get_json(&app, "/api/dashboard?sector=").await;
    assert_eq!(json["data"]["summary"]["total"], 0);
    assert!(!json["data"]["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_export_returns_csv_attachment() {
    let app = app();
    post_ingest(&app, DESCRIPTIVE, TICKETING).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/export?origin=ticketing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"incidents_20251219_120000.csv"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("T-1,Rede,TCLOUD-DEVOPS-PROTHEUS,2025-12-19 08:00:00,2025-12-19 18:00:00,ticketing,on_time"));
}
