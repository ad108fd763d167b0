//! Incident core types
//!
//! Canonical incident record shared by the ingest pipeline, the store and
//! the API surfaces, plus the reporting contract consumed by dashboards.

pub mod error;
pub mod incident;
pub mod report;

pub use error::{ErrorCode, ErrorReport};
pub use incident::{
    order_newest_first, CanonicalIncident, Origin, SlaStatus, UNASSIGNED_SECTOR,
    UNIDENTIFIED_FAILURE,
};
pub use report::{
    breakdown_by_failure_type, breakdown_by_sector, distinct_origins, distinct_sectors,
    BreakdownEntry, Dashboard, IncidentFilter, SlaSummary,
};
