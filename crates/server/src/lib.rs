//! Incident server library
//!
//! Router and handlers over the ingest pipeline and incident store, exposed
//! for in-process testing.

pub mod api;
pub mod logging;

pub use api::{api_router, ApiResponse, AppState, FilterQuery, IngestRequest};
