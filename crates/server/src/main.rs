// incident-server main.rs
// HTTP API for incident ingestion and SLA reporting

use anyhow::Context;
use incident_ingest::{IncidentStore, IngestConfig, IngestPipeline};
use incident_server::{api_router, logging, AppState};
use std::path::{Path, PathBuf};
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = logging::data_dir();
    let _guard = logging::init_logging(&logging::get_log_dir());

    let args: Vec<String> = std::env::args().collect();

    // Port from CLI args or environment
    let port: u16 = args
        .iter()
        .position(|a| a == "--port" || a == "-p")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .or_else(|| {
            std::env::var("INCIDENT_SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(3000);

    let db_path = std::env::var("INCIDENT_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join("incidents.db"));

    let config = match std::env::var("INCIDENT_CONFIG") {
        Ok(path) => IngestConfig::load(Path::new(&path))
            .with_context(|| format!("loading config {}", path))?,
        Err(_) => IngestConfig::default(),
    };

    tracing::info!("Database: {:?}", db_path);
    tracing::info!("Port: {}", port);

    let store = IncidentStore::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let pipeline = IngestPipeline::new(config).context("building ingest pipeline")?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api_router(AppState::new(store, pipeline)).layer(cors);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Incident server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}
