//! Error types for the ingest pipeline and the incident store.
//!
//! Fatal errors abort a run and leave stored state untouched. Row-level
//! problems (bad dates, rows that cannot be persisted) never show up here;
//! they are carried as values in the run statistics and upsert report.

use crate::config::CanonicalField;
use incident_core::{ErrorCode, ErrorReport, Origin};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One required canonical field that no candidate header matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub field: CanonicalField,
    pub candidates: Vec<String>,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (tried: {})", self.field, self.candidates.join(", "))
    }
}

/// Every missing required field of one source, reported together
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required columns: {}", format_missing(.missing))]
pub struct SchemaValidationError {
    pub missing: Vec<MissingField>,
}

fn format_missing(missing: &[MissingField]) -> String {
    missing
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl SchemaValidationError {
    pub fn missing_fields(&self) -> Vec<CanonicalField> {
        self.missing.iter().map(|m| m.field).collect()
    }

    pub fn names(&self, field: CanonicalField) -> bool {
        self.missing.iter().any(|m| m.field == field)
    }

    pub fn to_report(&self, origin: Origin) -> ErrorReport {
        ErrorReport::new(ErrorCode::SchemaValidation, self.to_string())
            .with_origin(origin)
            .with_fields(
                self.missing
                    .iter()
                    .map(|m| m.field.as_str().to_string())
                    .collect(),
            )
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source is empty")]
    Empty,

    #[error("malformed delimited data: {0}")]
    Csv(#[from] csv::Error),

    #[error("record {line} has {found} fields, header has {expected}")]
    TooManyFields {
        line: u64,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to create store directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database connection lock poisoned")]
    LockPoisoned,

    #[error("stored row {id} is corrupt: {reason}")]
    CorruptRow { id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that abort an ingestion run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("schema validation failed: {}", format_schema_errors(.0))]
    Schema(Vec<(Origin, SchemaValidationError)>),

    #[error("{origin} source: {source}")]
    Source {
        origin: Origin,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Anything structurally unexpected while normalizing
    #[error("processing failed: {0}")]
    Processing(String),
}

fn format_schema_errors(errors: &[(Origin, SchemaValidationError)]) -> String {
    errors
        .iter()
        .map(|(origin, e)| format!("{}: {}", origin, e))
        .collect::<Vec<_>>()
        .join(" | ")
}

impl IngestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            IngestError::Schema(_) => ErrorCode::SchemaValidation,
            IngestError::Source { .. } => ErrorCode::SourceRead,
            IngestError::Store(_) | IngestError::Processing(_) => ErrorCode::UnhandledProcessing,
        }
    }

    /// User-visible reports, one per schema problem
    pub fn reports(&self) -> Vec<ErrorReport> {
        match self {
            IngestError::Schema(errors) => errors
                .iter()
                .map(|(origin, e)| e.to_report(*origin))
                .collect(),
            IngestError::Source { origin, source } => {
                vec![ErrorReport::new(ErrorCode::SourceRead, source.to_string()).with_origin(*origin)]
            }
            other => vec![ErrorReport::new(other.code(), other.to_string())],
        }
    }
}
