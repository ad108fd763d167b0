//! Record unification
//!
//! Projects each source's rows onto `CanonicalIncident` and merges the
//! per-source batches into one history ordered newest first.

use crate::config::CanonicalField;
use crate::error::IngestError;
use crate::failure::{failure_from_subject, FailureExtractor};
use crate::schema::ColumnMap;
use crate::sla::Deadline;
use crate::source::{RawIncidentRow, SourceTable};
use chrono::NaiveDateTime;
use incident_core::{order_newest_first, CanonicalIncident, Origin, SlaStatus, UNASSIGNED_SECTOR};

/// Canonical incidents produced from one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentBatch {
    pub origin: Origin,
    pub incidents: Vec<CanonicalIncident>,
}

/// Row-aligned values already derived for a source
#[derive(Debug, Clone)]
pub struct DerivedColumns {
    pub opened_at: Vec<Option<NaiveDateTime>>,
    pub deadlines: Vec<Deadline>,
}

/// Blank or missing team -> `Unassigned`
pub fn normalize_sector(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => UNASSIGNED_SECTOR.to_string(),
    }
}

pub fn project(
    origin: Origin,
    table: &SourceTable,
    columns: &ColumnMap,
    derived: &DerivedColumns,
    extractor: &FailureExtractor,
    now: NaiveDateTime,
) -> Result<IncidentBatch, IngestError> {
    let rows = table.rows();
    if derived.opened_at.len() != rows.len() || derived.deadlines.len() != rows.len() {
        return Err(IngestError::Processing(format!(
            "{} source: {} rows but {} opening dates and {} deadlines",
            origin,
            rows.len(),
            derived.opened_at.len(),
            derived.deadlines.len()
        )));
    }

    let id_column = columns.get(CanonicalField::Id).ok_or_else(|| {
        IngestError::Processing(format!("{} source: ID column not resolved", origin))
    })?;

    let incidents = rows
        .iter()
        .zip(derived.opened_at.iter().zip(&derived.deadlines))
        .map(|(row, (opened_at, deadline))| {
            let description = cell(row, columns, CanonicalField::Description);
            let (failure_type, description) = match origin {
                Origin::Descriptive => (
                    extractor.classify(description),
                    description.unwrap_or_default().to_string(),
                ),
                Origin::Ticketing => {
                    let subject = cell(row, columns, CanonicalField::FailureType);
                    (
                        failure_from_subject(subject),
                        description.or(subject).unwrap_or_default().to_string(),
                    )
                }
            };

            CanonicalIncident {
                id: row.get(id_column).unwrap_or_default().trim().to_string(),
                failure_type,
                sector: normalize_sector(cell(row, columns, CanonicalField::Team)),
                opened_at: *opened_at,
                due_at: deadline.due_at,
                origin,
                sla_status: SlaStatus::evaluate(deadline.due_at, now),
                description,
            }
        })
        .collect();

    Ok(IncidentBatch { origin, incidents })
}

fn cell<'r>(row: &'r RawIncidentRow, columns: &ColumnMap, field: CanonicalField) -> Option<&'r str> {
    columns.get(field).and_then(|header| row.get(header))
}

/// Concatenate batches in the given order, then order newest first.
/// Incidents without an opening date keep their relative order at the end.
pub fn unify<I>(batches: I) -> Vec<CanonicalIncident>
where
    I: IntoIterator<Item = IncidentBatch>,
{
    let mut all: Vec<CanonicalIncident> = batches.into_iter().flat_map(|b| b.incidents).collect();
    order_newest_first(&mut all);
    all
}
