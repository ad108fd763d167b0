//! Date parsing
//!
//! Columns are parsed in two stages. Stage 1 tries strict day-first formats
//! on every cell. Stage 2, the long-form locale parser
//! ("17 de dez. de 2025 14:46:02"), runs only when stage 1 parsed nothing at
//! all in the column.
//!
//! Known limitation: the fallback decision is made per column, not per row.
//! A column that is mostly numeric dates with a few long-form cells keeps
//! those cells unparsed.

use crate::config::{DateConfig, MonthTable};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Result of parsing one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateOutcome {
    Parsed(NaiveDateTime),
    /// Blank cell or no such column; a legitimate null
    Missing,
    /// Text was present but matched no known format
    Unparseable { raw: String },
}

impl DateOutcome {
    pub fn value(&self) -> Option<NaiveDateTime> {
        match self {
            DateOutcome::Parsed(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, DateOutcome::Parsed(_))
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, DateOutcome::Unparseable { .. })
    }
}

/// Which stage produced a column's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    Generic,
    LocaleFallback,
}

// ============================================================================
// Stage 1: strict formats
// ============================================================================

#[derive(Debug, Clone)]
pub struct GenericDateParser {
    datetime_formats: Vec<String>,
    date_formats: Vec<String>,
}

impl GenericDateParser {
    pub fn new(config: &DateConfig) -> Self {
        Self {
            datetime_formats: config.datetime_formats.clone(),
            date_formats: config.date_formats.clone(),
        }
    }

    pub fn parse(&self, raw: &str) -> DateOutcome {
        let s = raw.trim();
        if s.is_empty() {
            return DateOutcome::Missing;
        }

        for fmt in &self.datetime_formats {
            if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
                return DateOutcome::Parsed(ts);
            }
        }

        for fmt in &self.date_formats {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                if let Some(ts) = date.and_hms_opt(0, 0, 0) {
                    return DateOutcome::Parsed(ts);
                }
            }
        }

        // Offset-qualified timestamps keep their wall-clock time
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return DateOutcome::Parsed(dt.naive_local());
        }

        DateOutcome::Unparseable { raw: s.to_string() }
    }
}

// ============================================================================
// Stage 2: long-form locale dates
// ============================================================================

#[derive(Debug, Clone)]
pub struct LocaleDateParser {
    connective: String,
    months: MonthTable,
}

impl LocaleDateParser {
    pub fn new(connective: &str, months: MonthTable) -> Self {
        Self {
            connective: connective.to_lowercase(),
            months,
        }
    }

    pub fn from_config(config: &DateConfig) -> Self {
        Self::new(&config.connective, config.months.clone())
    }

    /// Never panics; anything that does not assemble into a valid
    /// timestamp is `Unparseable`
    pub fn parse(&self, raw: &str) -> DateOutcome {
        let s = raw.trim();
        if s.is_empty() {
            return DateOutcome::Missing;
        }
        match self.assemble(s) {
            Some(ts) => DateOutcome::Parsed(ts),
            None => DateOutcome::Unparseable { raw: s.to_string() },
        }
    }

    fn assemble(&self, s: &str) -> Option<NaiveDateTime> {
        let cleaned = s.replace('.', "").to_lowercase();
        let parts: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|p| *p != self.connective)
            .collect();
        if parts.len() < 3 {
            return None;
        }

        let day: u32 = parts[0].parse().ok()?;
        // Unknown month names land in January rather than failing the row
        let month = self.months.lookup(parts[1]).unwrap_or(1);
        let year: i32 = parts[2].parse().ok()?;
        let time = match parts.get(3) {
            Some(t) => parse_time(t)?,
            None => NaiveTime::from_hms_opt(0, 0, 0)?,
        };

        Some(NaiveDate::from_ymd_opt(year, month, day)?.and_time(time))
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

// ============================================================================
// Column-level two-stage parse
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnParse {
    pub values: Vec<DateOutcome>,
    pub strategy: ParseStrategy,
}

impl ColumnParse {
    pub fn timestamps(&self) -> Vec<Option<NaiveDateTime>> {
        self.values.iter().map(DateOutcome::value).collect()
    }

    pub fn parsed_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_parsed()).count()
    }

    pub fn unparseable_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_unparseable()).count()
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDateParser {
    generic: GenericDateParser,
    locale: LocaleDateParser,
}

impl ColumnDateParser {
    pub fn new(config: &DateConfig) -> Self {
        Self {
            generic: GenericDateParser::new(config),
            locale: LocaleDateParser::from_config(config),
        }
    }

    pub fn generic(&self) -> &GenericDateParser {
        &self.generic
    }

    /// Stage 1 only; used for explicit deadline columns
    pub fn parse_generic(&self, values: &[Option<&str>]) -> Vec<DateOutcome> {
        values
            .iter()
            .map(|v| v.map_or(DateOutcome::Missing, |s| self.generic.parse(s)))
            .collect()
    }

    /// Stage 1 on every cell; stage 2 on every cell only if stage 1 parsed none
    pub fn parse_column(&self, values: &[Option<&str>]) -> ColumnParse {
        let stage1 = self.parse_generic(values);
        if stage1.iter().any(DateOutcome::is_parsed) {
            return ColumnParse {
                values: stage1,
                strategy: ParseStrategy::Generic,
            };
        }

        let stage2 = values
            .iter()
            .map(|v| v.map_or(DateOutcome::Missing, |s| self.locale.parse(s)))
            .collect();
        ColumnParse {
            values: stage2,
            strategy: ParseStrategy::LocaleFallback,
        }
    }
}
