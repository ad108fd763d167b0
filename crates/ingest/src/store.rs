// Incident persistence using SQLite

use crate::error::StoreError;
use chrono::NaiveDateTime;
use incident_core::{order_newest_first, CanonicalIncident, Origin, SlaStatus};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Text format of stored timestamps. `%.f` writes nothing for whole seconds
/// and parses with or without a fraction.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A row the store refused to write; the rest of the batch still lands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPersistError {
    /// Position in the submitted batch
    pub row: usize,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertReport {
    pub written: usize,
    pub skipped: Vec<RowPersistError>,
    /// Ids that appeared under more than one origin in the batch
    pub id_collisions: Vec<String>,
}

impl UpsertReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.id_collisions.is_empty()
    }
}

pub struct IncidentStore {
    conn: Mutex<Connection>,
}

impl IncidentStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        tracing::debug!(path = %path.display(), "incident store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS incidents (
                id TEXT PRIMARY KEY,
                failure_type TEXT NOT NULL,
                sector TEXT NOT NULL,
                opened_at TEXT,
                due_at TEXT,
                origin TEXT NOT NULL,
                sla_status TEXT NOT NULL,
                description TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_incidents_opened
                ON incidents(opened_at DESC);

            CREATE INDEX IF NOT EXISTS idx_incidents_sector
                ON incidents(sector);
        "#,
        )?;
        Ok(())
    }

    /// Write a batch with full-row replacement keyed by `id`.
    ///
    /// Rows failing validation are reported in `skipped`; everything else is
    /// written in one transaction, so an unexpected error leaves the table
    /// exactly as it was.
    pub fn upsert_batch(&self, incidents: &[CanonicalIncident]) -> Result<UpsertReport, StoreError> {
        let mut report = UpsertReport::default();

        let mut valid = Vec::with_capacity(incidents.len());
        for (row, incident) in incidents.iter().enumerate() {
            match validate(incident) {
                Ok(()) => valid.push(incident),
                Err(reason) => {
                    tracing::warn!(row, id = %incident.id, %reason, "skipping incident");
                    report.skipped.push(RowPersistError {
                        row,
                        id: incident.id.clone(),
                        reason,
                    });
                }
            }
        }

        report.id_collisions = find_collisions(&valid);
        for id in &report.id_collisions {
            tracing::warn!(%id, "incident id present in more than one origin; last row wins");
        }

        let updated_at = chrono::Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO incidents
                 (id, failure_type, sector, opened_at, due_at, origin, sla_status, description, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for incident in &valid {
                stmt.execute(params![
                    incident.id,
                    incident.failure_type,
                    incident.sector,
                    incident.opened_at.map(format_ts),
                    incident.due_at.map(format_ts),
                    incident.origin.as_str(),
                    incident.sla_status.as_str(),
                    incident.description,
                    updated_at,
                ])?;
                report.written += 1;
            }
        }
        tx.commit()?;

        tracing::info!(
            written = report.written,
            skipped = report.skipped.len(),
            collisions = report.id_collisions.len(),
            "upsert committed"
        );
        Ok(report)
    }

    /// Full history with SLA status recomputed against `now`, newest first
    pub fn load_all(&self, now: NaiveDateTime) -> Result<Vec<CanonicalIncident>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, failure_type, sector, opened_at, due_at, origin, description
             FROM incidents",
        )?;
        let mut rows = stmt.query([])?;

        let mut incidents = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let opened_at: Option<String> = row.get(3)?;
            let due_at: Option<String> = row.get(4)?;
            let origin: String = row.get(5)?;

            let due_at = parse_ts(&id, due_at)?;
            incidents.push(CanonicalIncident {
                failure_type: row.get(1)?,
                sector: row.get(2)?,
                opened_at: parse_ts(&id, opened_at)?,
                due_at,
                origin: origin
                    .parse::<Origin>()
                    .map_err(|reason| StoreError::CorruptRow {
                        id: id.clone(),
                        reason,
                    })?,
                sla_status: SlaStatus::evaluate(due_at, now),
                description: row.get(6)?,
                id,
            });
        }

        order_newest_first(&mut incidents);
        Ok(incidents)
    }

    pub fn get(&self, id: &str, now: NaiveDateTime) -> Result<Option<CanonicalIncident>, StoreError> {
        let conn = self.lock()?;
        let found: Option<(String, String, Option<String>, Option<String>, String, String)> = conn
            .query_row(
                "SELECT failure_type, sector, opened_at, due_at, origin, description
                 FROM incidents WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((failure_type, sector, opened_at, due_at, origin, description)) = found else {
            return Ok(None);
        };
        let due_at = parse_ts(id, due_at)?;
        Ok(Some(CanonicalIncident {
            id: id.to_string(),
            failure_type,
            sector,
            opened_at: parse_ts(id, opened_at)?,
            due_at,
            origin: origin.parse().map_err(|reason| StoreError::CorruptRow {
                id: id.to_string(),
                reason,
            })?,
            sla_status: SlaStatus::evaluate(due_at, now),
            description,
        }))
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn health_check(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

fn validate(incident: &CanonicalIncident) -> Result<(), String> {
    if incident.id.trim().is_empty() {
        return Err("blank incident id".to_string());
    }
    if incident.failure_type.trim().is_empty() {
        return Err("blank failure type".to_string());
    }
    Ok(())
}

fn find_collisions(incidents: &[&CanonicalIncident]) -> Vec<String> {
    let mut origins: HashMap<&str, Origin> = HashMap::new();
    let mut collisions = Vec::new();
    for incident in incidents {
        match origins.get(incident.id.as_str()) {
            Some(first) if *first != incident.origin => {
                if !collisions.iter().any(|c: &String| c == &incident.id) {
                    collisions.push(incident.id.clone());
                }
            }
            Some(_) => {}
            None => {
                origins.insert(&incident.id, incident.origin);
            }
        }
    }
    collisions
}

fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(id: &str, raw: Option<String>) -> Result<Option<NaiveDateTime>, StoreError> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
            .map(Some)
            .map_err(|e| StoreError::CorruptRow {
                id: id.to_string(),
                reason: format!("bad timestamp '{}': {}", s, e),
            }),
    }
}
