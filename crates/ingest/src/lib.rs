//! Incident ingestion
//!
//! Reads descriptive and ticketing exports, resolves their columns onto the
//! canonical incident, extracts failure types, parses locale dates, derives
//! SLA deadlines and upserts the unified history into SQLite.

pub mod config;
pub mod dates;
pub mod error;
pub mod export;
pub mod failure;
pub mod pipeline;
pub mod schema;
pub mod sla;
pub mod source;
pub mod store;
pub mod unify;

pub use config::{CanonicalField, DateConfig, FieldSpec, IngestConfig, MonthTable, SourceSchema};
pub use dates::{
    ColumnDateParser, ColumnParse, DateOutcome, GenericDateParser, LocaleDateParser, ParseStrategy,
};
pub use error::{
    ConfigError, IngestError, MissingField, SchemaValidationError, SourceError, StoreError,
};
pub use failure::{failure_from_subject, FailureExtractor};
pub use pipeline::{
    read_source, IngestOutcome, IngestPipeline, IngestRun, RunSummary, SourceStats,
};
pub use schema::{ColumnMap, SchemaResolver};
pub use sla::{Deadline, DeadlineSource, SlaPolicy};
pub use source::{RawIncidentRow, SourceTable};
pub use store::{IncidentStore, RowPersistError, UpsertReport};
pub use unify::{normalize_sector, unify, IncidentBatch};
