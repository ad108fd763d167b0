//! Ingest configuration
//!
//! YAML/JSON configuration for header candidates, date parsing, failure
//! labels and SLA policy. Defaults reproduce the two supported export
//! layouts; a config file only needs to list what it overrides.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Semantic columns every source is mapped onto
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Id,
    Description,
    OpenedAt,
    Team,
    FailureType,
    DueAt,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Id => "ID",
            CanonicalField::Description => "Description",
            CanonicalField::OpenedAt => "OpenedAt",
            CanonicalField::Team => "Team",
            CanonicalField::FailureType => "FailureType",
            CanonicalField::DueAt => "DueAt",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered header-name candidates for one canonical field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: CanonicalField,

    /// Tried in order; the first header present wins
    pub candidates: Vec<String>,

    #[serde(default = "default_true")]
    pub required: bool,
}

impl FieldSpec {
    pub fn required(field: CanonicalField, candidates: &[&str]) -> Self {
        Self {
            field,
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            required: true,
        }
    }

    pub fn optional(field: CanonicalField, candidates: &[&str]) -> Self {
        Self {
            required: false,
            ..Self::required(field, candidates)
        }
    }
}

/// Column requirements for one source layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSchema {
    pub fields: Vec<FieldSpec>,
}

impl SourceSchema {
    /// Free-text export: failure type lives inside the description
    pub fn descriptive_default() -> Self {
        Self {
            fields: vec![
                FieldSpec::required(CanonicalField::Id, &["Exibir ID", "ID", "Ticket"]),
                FieldSpec::required(CanonicalField::Description, &["Descrição", "Description"]),
                FieldSpec::required(
                    CanonicalField::OpenedAt,
                    &["Data de criação", "Created", "Data Abertura"],
                ),
                FieldSpec::required(
                    CanonicalField::Team,
                    &["Nome do grupo designado", "Grupo", "Assignment Group"],
                ),
            ],
        }
    }

    /// Structured ticketing export with subject and deadline columns
    pub fn ticketing_default() -> Self {
        Self {
            fields: vec![
                FieldSpec::optional(
                    CanonicalField::Team,
                    &["Equipe Responsável", "Team", "Grupo"],
                ),
                FieldSpec::required(
                    CanonicalField::OpenedAt,
                    &["Data Hora de Abertura", "Created Date"],
                ),
                FieldSpec::required(CanonicalField::FailureType, &["Assunto", "Tipo", "Resumo"]),
                FieldSpec::required(CanonicalField::Id, &["Número", "ID", "Incident ID"]),
                FieldSpec::optional(CanonicalField::DueAt, &["Resolver até", "SLA", "Due Date"]),
                FieldSpec::optional(CanonicalField::Description, &["Descrição", "Description"]),
            ],
        }
    }

    pub fn spec(&self, field: CanonicalField) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.field == field)
    }
}

/// Abbreviated month names of the export locale, keyed by their first three letters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct MonthTable {
    entries: BTreeMap<String, u32>,
}

impl MonthTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (prefix3(&k.as_ref().to_lowercase()), v))
                .collect(),
        }
    }

    /// Brazilian Portuguese abbreviations ("jan" .. "dez")
    pub fn portuguese() -> Self {
        Self::new([
            ("jan", 1),
            ("fev", 2),
            ("mar", 3),
            ("abr", 4),
            ("mai", 5),
            ("jun", 6),
            ("jul", 7),
            ("ago", 8),
            ("set", 9),
            ("out", 10),
            ("nov", 11),
            ("dez", 12),
        ])
    }

    /// Looks up the first three characters of `token`, case-insensitively
    pub fn lookup(&self, token: &str) -> Option<u32> {
        self.entries.get(&prefix3(&token.to_lowercase())).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.entries.iter().find(|(_, m)| !(1..=12).contains(*m)) {
            Some((name, m)) => Err(ConfigError::Invalid(format!(
                "month '{}' maps to {}, expected 1-12",
                name, m
            ))),
            None => Ok(()),
        }
    }
}

impl Default for MonthTable {
    fn default() -> Self {
        Self::portuguese()
    }
}

fn prefix3(s: &str) -> String {
    s.chars().take(3).collect()
}

/// Date parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateConfig {
    /// chrono formats with a time component, tried in order (day-first)
    #[serde(default = "default_datetime_formats")]
    pub datetime_formats: Vec<String>,

    /// chrono date-only formats; the time defaults to midnight
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,

    /// Connective word of the long-form locale date ("17 de dez. de 2025")
    #[serde(default = "default_connective")]
    pub connective: String,

    #[serde(default)]
    pub months: MonthTable,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            datetime_formats: default_datetime_formats(),
            date_formats: default_date_formats(),
            connective: default_connective(),
            months: MonthTable::default(),
        }
    }
}

fn default_datetime_formats() -> Vec<String> {
    [
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d-%m-%Y %H:%M:%S",
        "%d-%m-%Y %H:%M",
        "%d.%m.%Y %H:%M:%S",
        "%d.%m.%Y %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_date_formats() -> Vec<String> {
    ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_connective() -> String {
    "de".to_string()
}

/// Top-level ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    #[serde(default = "SourceSchema::descriptive_default")]
    pub descriptive: SourceSchema,

    #[serde(default = "SourceSchema::ticketing_default")]
    pub ticketing: SourceSchema,

    #[serde(default)]
    pub dates: DateConfig,

    /// Labels that introduce the failure type in free text
    #[serde(default = "default_failure_labels")]
    pub failure_labels: Vec<String>,

    /// Deadline applied when a source has no explicit one
    #[serde(default = "default_resolution_window_hours")]
    pub resolution_window_hours: i64,

    /// Sectors selected by default in reports when present in the data
    #[serde(default)]
    pub preferred_sectors: Vec<String>,

    #[serde(default = "default_export_delimiter")]
    pub export_delimiter: char,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            descriptive: SourceSchema::descriptive_default(),
            ticketing: SourceSchema::ticketing_default(),
            dates: DateConfig::default(),
            failure_labels: default_failure_labels(),
            resolution_window_hours: default_resolution_window_hours(),
            preferred_sectors: Vec::new(),
            export_delimiter: default_export_delimiter(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_failure_labels() -> Vec<String> {
    ["Tipo da falha", "Tipo de falha", "Tp. falha", "Tp falha", "Falha"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_resolution_window_hours() -> i64 {
    24
}

fn default_export_delimiter() -> char {
    ','
}

impl IngestConfig {
    /// Load from YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load by extension: `.json` is JSON, anything else is YAML
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution_window_hours <= 0 {
            return Err(ConfigError::Invalid(format!(
                "resolution_window_hours must be positive, got {}",
                self.resolution_window_hours
            )));
        }
        if !self.export_delimiter.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "export_delimiter must be ASCII, got '{}'",
                self.export_delimiter
            )));
        }
        if self.failure_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "failure_labels must contain at least one label".to_string(),
            ));
        }
        for (name, schema) in [("descriptive", &self.descriptive), ("ticketing", &self.ticketing)] {
            for field in [CanonicalField::Id, CanonicalField::OpenedAt] {
                match schema.spec(field) {
                    Some(spec) if spec.required && !spec.candidates.is_empty() => {}
                    _ => {
                        return Err(ConfigError::Invalid(format!(
                            "{} schema must require {} with at least one candidate",
                            name, field
                        )))
                    }
                }
            }
        }
        self.dates.months.validate()
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
