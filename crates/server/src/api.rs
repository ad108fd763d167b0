//! HTTP handlers
//!
//! Every JSON response uses the `{ success, data?, error? }` envelope.
//! Failed ingestion runs additionally carry one `ErrorReport` per problem.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDateTime;
use incident_core::{
    distinct_sectors, CanonicalIncident, Dashboard, ErrorCode, ErrorReport, IncidentFilter, Origin,
};
use incident_ingest::{export, IncidentStore, IngestError, IngestPipeline, SourceTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<IncidentStore>,
    pub pipeline: Arc<IngestPipeline>,
    clock: fn() -> NaiveDateTime,
}

impl AppState {
    pub fn new(store: IncidentStore, pipeline: IngestPipeline) -> Self {
        Self {
            store: Arc::new(store),
            pipeline: Arc::new(pipeline),
            clock: local_now,
        }
    }

    /// Evaluate SLA status against a fixed clock instead of local time
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/api/ingest", post(ingest))
        .route("/api/incidents", get(list_incidents))
        .route("/api/dashboard", get(dashboard))
        .route("/api/export", get(export_incidents))
        .with_state(state)
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<ErrorReport>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            reports: Vec::new(),
        })
    }

    fn err(msg: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(msg.to_string()),
            reports: Vec::new(),
        })
    }

    fn err_with_reports(msg: &str, reports: Vec<ErrorReport>) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(msg.to_string()),
            reports,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub descriptive_csv: String,
    pub ticketing_csv: String,
}

/// Sector and origin selection from the query string.
///
/// `sector` may repeat and each value names one sector verbatim, so names
/// containing commas are selectable (`?sector=A&sector=B`). `origin` may
/// repeat or be comma-separated. A parameter present only with empty values
/// selects nothing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    pub sector: Option<Vec<String>>,
    pub origin: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    incidents: usize,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().and_then(|_| state.store.count()) {
        Ok(incidents) => (
            StatusCode::OK,
            ApiResponse::ok(HealthResponse {
                status: "ok",
                incidents,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::err(&format!("Database error: {}", e)),
            )
        }
    }
}

async fn ingest(State(state): State<AppState>, Json(req): Json<IngestRequest>) -> Response {
    let sources = SourceTable::from_bytes(req.descriptive_csv.as_bytes())
        .map_err(|source| IngestError::Source {
            origin: Origin::Descriptive,
            source,
        })
        .and_then(|d| {
            SourceTable::from_bytes(req.ticketing_csv.as_bytes())
                .map(|t| (d, t))
                .map_err(|source| IngestError::Source {
                    origin: Origin::Ticketing,
                    source,
                })
        });

    let result = sources.and_then(|(descriptive, ticketing)| {
        state
            .pipeline
            .ingest(&descriptive, &ticketing, &state.store, state.now())
    });

    match result {
        Ok(outcome) => (StatusCode::OK, ApiResponse::ok(outcome)).into_response(),
        Err(e) => {
            let status = match e.code() {
                ErrorCode::SchemaValidation => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::SourceRead => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(error = %e, %status, "ingestion rejected");
            (
                status,
                ApiResponse::<()>::err_with_reports(&e.to_string(), e.reports()),
            )
                .into_response()
        }
    }
}

async fn list_incidents(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let query = FilterQuery::from_pairs(params);
    let now = state.now();
    let incidents = match state.store.load_all(now) {
        Ok(incidents) => incidents,
        Err(e) => return store_error(e),
    };
    let filter = match query.to_filter(None) {
        Ok(filter) => filter,
        Err(msg) => return (StatusCode::BAD_REQUEST, ApiResponse::<()>::err(&msg)).into_response(),
    };

    let view: Vec<&CanonicalIncident> = filter.apply(&incidents);
    (StatusCode::OK, ApiResponse::ok(view)).into_response()
}

async fn dashboard(State(state): State<AppState>, Query(params): Query<Vec<(String, String)>>) -> Response {
    let query = FilterQuery::from_pairs(params);
    let now = state.now();
    let incidents = match state.store.load_all(now) {
        Ok(incidents) => incidents,
        Err(e) => return store_error(e),
    };
    let filter = match query.to_filter(Some((
        incidents.as_slice(),
        state.pipeline.config().preferred_sectors.as_slice(),
    ))) {
        Ok(filter) => filter,
        Err(msg) => return (StatusCode::BAD_REQUEST, ApiResponse::<()>::err(&msg)).into_response(),
    };

    (StatusCode::OK, ApiResponse::ok(Dashboard::build(incidents, &filter, now))).into_response()
}

async fn export_incidents(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let query = FilterQuery::from_pairs(params);
    let now = state.now();
    let incidents = match state.store.load_all(now) {
        Ok(incidents) => incidents,
        Err(e) => return store_error(e),
    };
    let config = state.pipeline.config();
    let filter = match query.to_filter(Some((incidents.as_slice(), config.preferred_sectors.as_slice()))) {
        Ok(filter) => filter,
        Err(msg) => return (StatusCode::BAD_REQUEST, ApiResponse::<()>::err(&msg)).into_response(),
    };

    match export::to_bytes(filter.apply(&incidents), config.export_delimiter as u8) {
        Ok(bytes) => {
            let filename = format!("incidents_{}.csv", now.format("%Y%m%d_%H%M%S"));
            let content_disposition = format!("attachment; filename=\"{}\"", filename);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (header::CONTENT_DISPOSITION, content_disposition.as_str()),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::<()>::err(&format!("Export failed: {}", e)),
        )
            .into_response(),
    }
}

fn store_error(e: incident_ingest::StoreError) -> Response {
    tracing::error!(error = %e, "store read failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiResponse::<()>::err(&format!("Database error: {}", e)),
    )
        .into_response()
}

impl FilterQuery {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "sector" => &mut query.sector,
                "origin" => &mut query.origin,
                _ => continue,
            };
            slot.get_or_insert_with(Vec::new).push(value.into());
        }
        query
    }

    /// With `preferred`, an absent `sector` defaults to the preferred sectors
    /// present in the data; without it, to every sector.
    fn to_filter(
        &self,
        preferred: Option<(&[CanonicalIncident], &[String])>,
    ) -> Result<IncidentFilter, String> {
        let mut filter = match (&self.sector, preferred) {
            (Some(values), _) => IncidentFilter::all().with_sectors(
                values
                    .iter()
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            ),
            (None, Some((incidents, preferred))) => {
                IncidentFilter::with_preferred_sectors(&distinct_sectors(incidents), preferred)
            }
            (None, None) => IncidentFilter::all(),
        };

        if let Some(values) = &self.origin {
            let origins = values
                .iter()
                .flat_map(|raw| split_list(raw))
                .map(|s| s.parse::<Origin>())
                .collect::<Result<BTreeSet<_>, _>>()?;
            filter = filter.with_origins(origins);
        }
        Ok(filter)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
