//! Error taxonomy shared by the ingest pipeline and the API surfaces.
//! Codes are stable strings so reports can be matched by clients.

use serde::{Deserialize, Serialize};

use crate::incident::Origin;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Required canonical column not found in a source
    SchemaValidation,
    /// Source file could not be read or split into rows
    SourceRead,
    /// Per-row date that could not be parsed (non-fatal)
    DateParse,
    /// Per-row write rejected during upsert (non-fatal)
    RowPersist,
    /// Anything else that aborted a run
    UnhandledProcessing,
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::SchemaValidation => "schema_validation",
            ErrorCode::SourceRead => "source_read",
            ErrorCode::DateParse => "date_parse",
            ErrorCode::RowPersist => "row_persist",
            ErrorCode::UnhandledProcessing => "unhandled_processing",
        }
    }

    /// Whether this class of error aborts the ingestion run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorCode::DateParse | ErrorCode::RowPersist)
    }
}

/// User-visible error entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    /// Canonical fields involved (schema errors only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            origin: None,
            fields: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }
}
