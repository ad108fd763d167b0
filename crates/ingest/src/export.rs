//! Spreadsheet export of a filtered incident view
//!
//! One sheet as delimited text: a header row, then one row per incident in
//! canonical column order. Use `;` for spreadsheet locales with comma decimals.

use crate::store::TIMESTAMP_FORMAT;
use chrono::NaiveDateTime;
use incident_core::CanonicalIncident;
use std::io::Write;
use std::path::Path;

pub const EXPORT_COLUMNS: [&str; 8] = [
    "id",
    "failure_type",
    "sector",
    "opened_at",
    "due_at",
    "origin",
    "sla_status",
    "description",
];

pub fn write_incidents<'a, W, I>(writer: W, incidents: I, delimiter: u8) -> Result<(), csv::Error>
where
    W: Write,
    I: IntoIterator<Item = &'a CanonicalIncident>,
{
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    wtr.write_record(EXPORT_COLUMNS)?;
    for incident in incidents {
        let opened_at = format_opt(incident.opened_at);
        let due_at = format_opt(incident.due_at);
        wtr.write_record([
            incident.id.as_str(),
            incident.failure_type.as_str(),
            incident.sector.as_str(),
            opened_at.as_str(),
            due_at.as_str(),
            incident.origin.as_str(),
            incident.sla_status.as_str(),
            incident.description.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_bytes<'a, I>(incidents: I, delimiter: u8) -> Result<Vec<u8>, csv::Error>
where
    I: IntoIterator<Item = &'a CanonicalIncident>,
{
    let mut buf = Vec::new();
    write_incidents(&mut buf, incidents, delimiter)?;
    Ok(buf)
}

pub fn write_file<'a, I>(path: &Path, incidents: I, delimiter: u8) -> Result<(), csv::Error>
where
    I: IntoIterator<Item = &'a CanonicalIncident>,
{
    let file = std::fs::File::create(path)?;
    write_incidents(std::io::BufWriter::new(file), incidents, delimiter)?;
    tracing::info!(path = %path.display(), "incidents exported");
    Ok(())
}

fn format_opt(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}
