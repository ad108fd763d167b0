//! Ingestion pipeline
//!
//! One run takes a descriptive and a ticketing source, validates both
//! schemas up front, normalizes each into canonical incidents and unifies
//! them. `ingest` additionally upserts the result into the store. Nothing is
//! written unless both sources made it through normalization.

use crate::config::{CanonicalField, IngestConfig};
use crate::dates::{ColumnDateParser, ParseStrategy};
use crate::error::{ConfigError, IngestError, SchemaValidationError};
use crate::failure::FailureExtractor;
use crate::schema::{ColumnMap, SchemaResolver};
use crate::sla::SlaPolicy;
use crate::source::SourceTable;
use crate::store::{IncidentStore, UpsertReport};
use crate::unify::{self, DerivedColumns, IncidentBatch};
use chrono::NaiveDateTime;
use incident_core::{CanonicalIncident, Origin, UNASSIGNED_SECTOR, UNIDENTIFIED_FAILURE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Per-source extraction audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub origin: Origin,
    pub rows: usize,
    pub opened_at_strategy: ParseStrategy,
    /// Opening dates present but unparseable
    pub unparsed_opened_at: usize,
    /// Deadline cells present but unparseable, backfilled from the window
    pub unparsed_due_at: usize,
    pub explicit_deadlines: usize,
    pub derived_deadlines: usize,
    pub unidentified_failures: usize,
    pub unassigned_sectors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub evaluated_at: NaiveDateTime,
    pub total: usize,
    pub sources: Vec<SourceStats>,
}

/// Unified, not yet persisted, result of one run
#[derive(Debug, Clone)]
pub struct IngestRun {
    pub summary: RunSummary,
    pub incidents: Vec<CanonicalIncident>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub summary: RunSummary,
    pub upsert: UpsertReport,
}

pub struct IngestPipeline {
    config: IngestConfig,
    descriptive: SchemaResolver,
    ticketing: SchemaResolver,
    dates: ColumnDateParser,
    extractor: FailureExtractor,
    policy: SlaPolicy,
}

impl IngestPipeline {
    pub fn new(config: IngestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            descriptive: SchemaResolver::new(config.descriptive.clone()),
            ticketing: SchemaResolver::new(config.ticketing.clone()),
            dates: ColumnDateParser::new(&config.dates),
            extractor: FailureExtractor::new(&config.failure_labels)?,
            policy: SlaPolicy::from_hours(config.resolution_window_hours),
            config,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn resolver(&self, origin: Origin) -> &SchemaResolver {
        match origin {
            Origin::Descriptive => &self.descriptive,
            Origin::Ticketing => &self.ticketing,
        }
    }

    /// Resolve, normalize and unify both sources
    pub fn run(
        &self,
        descriptive: &SourceTable,
        ticketing: &SourceTable,
        now: NaiveDateTime,
    ) -> Result<IngestRun, IngestError> {
        let run_id = Uuid::new_v4();
        tracing::info!(
            %run_id,
            descriptive_rows = descriptive.len(),
            ticketing_rows = ticketing.len(),
            "ingestion run started"
        );

        // Both schemas are checked before any normalization so one failed
        // run reports every missing column of both sources.
        let mut schema_errors: Vec<(Origin, SchemaValidationError)> = Vec::new();
        let mut maps = Vec::with_capacity(2);
        for (origin, table) in [(Origin::Descriptive, descriptive), (Origin::Ticketing, ticketing)] {
            match self.resolver(origin).resolve(table.headers()) {
                Ok(map) => maps.push((origin, table, map)),
                Err(e) => {
                    tracing::warn!(%run_id, %origin, error = %e, "schema validation failed");
                    schema_errors.push((origin, e));
                }
            }
        }
        if !schema_errors.is_empty() {
            return Err(IngestError::Schema(schema_errors));
        }

        let mut batches = Vec::with_capacity(maps.len());
        let mut sources = Vec::with_capacity(maps.len());
        for (origin, table, map) in maps {
            let (batch, stats) = self.normalize(origin, table, &map, now)?;
            batches.push(batch);
            sources.push(stats);
        }

        let incidents = unify::unify(batches);
        tracing::info!(%run_id, total = incidents.len(), "ingestion run normalized");

        Ok(IngestRun {
            summary: RunSummary {
                run_id,
                evaluated_at: now,
                total: incidents.len(),
                sources,
            },
            incidents,
        })
    }

    /// Normalize a single source without unification
    pub fn process_source(
        &self,
        origin: Origin,
        table: &SourceTable,
        now: NaiveDateTime,
    ) -> Result<(Vec<CanonicalIncident>, SourceStats), IngestError> {
        let map = self
            .resolver(origin)
            .resolve(table.headers())
            .map_err(|e| IngestError::Schema(vec![(origin, e)]))?;
        let (batch, stats) = self.normalize(origin, table, &map, now)?;
        Ok((batch.incidents, stats))
    }

    /// `run` followed by one transactional upsert
    pub fn ingest(
        &self,
        descriptive: &SourceTable,
        ticketing: &SourceTable,
        store: &IncidentStore,
        now: NaiveDateTime,
    ) -> Result<IngestOutcome, IngestError> {
        let run = self.run(descriptive, ticketing, now)?;
        let upsert = store.upsert_batch(&run.incidents)?;
        tracing::info!(
            run_id = %run.summary.run_id,
            written = upsert.written,
            skipped = upsert.skipped.len(),
            "ingestion run persisted"
        );
        Ok(IngestOutcome {
            summary: run.summary,
            upsert,
        })
    }

    /// Read both files, then `ingest`
    pub fn ingest_files(
        &self,
        descriptive: &Path,
        ticketing: &Path,
        store: &IncidentStore,
        now: NaiveDateTime,
    ) -> Result<IngestOutcome, IngestError> {
        let descriptive = read_source(Origin::Descriptive, descriptive)?;
        let ticketing = read_source(Origin::Ticketing, ticketing)?;
        self.ingest(&descriptive, &ticketing, store, now)
    }

    fn normalize(
        &self,
        origin: Origin,
        table: &SourceTable,
        map: &ColumnMap,
        now: NaiveDateTime,
    ) -> Result<(IncidentBatch, SourceStats), IngestError> {
        let opened_column = map.get(CanonicalField::OpenedAt).ok_or_else(|| {
            IngestError::Processing(format!("{} source: opening date column not resolved", origin))
        })?;

        let opened = self.dates.parse_column(&table.column(opened_column));
        if opened.strategy == ParseStrategy::LocaleFallback {
            tracing::info!(%origin, column = opened_column, "opening dates parsed with locale fallback");
        }

        let explicit = map
            .get(CanonicalField::DueAt)
            .map(|column| self.dates.parse_generic(&table.column(column)));
        let opened_at = opened.timestamps();
        let deadlines = self.policy.deadlines(&opened_at, explicit.as_deref());

        let unparsed_due_at = explicit
            .as_ref()
            .map_or(0, |e| e.iter().filter(|v| v.is_unparseable()).count());
        let unparsed_opened_at = opened.unparseable_count();
        if unparsed_opened_at > 0 {
            tracing::warn!(%origin, count = unparsed_opened_at, "unparseable opening dates left empty");
        }
        if unparsed_due_at > 0 {
            tracing::warn!(%origin, count = unparsed_due_at, "unparseable deadlines replaced by the resolution window");
        }

        let derived = DerivedColumns {
            opened_at,
            deadlines,
        };
        let batch = unify::project(origin, table, map, &derived, &self.extractor, now)?;

        let derived_deadlines = derived.deadlines.iter().filter(|d| d.is_derived()).count();
        let stats = SourceStats {
            origin,
            rows: table.len(),
            opened_at_strategy: opened.strategy,
            unparsed_opened_at,
            unparsed_due_at,
            explicit_deadlines: derived.deadlines.len() - derived_deadlines,
            derived_deadlines,
            unidentified_failures: batch
                .incidents
                .iter()
                .filter(|i| i.failure_type == UNIDENTIFIED_FAILURE)
                .count(),
            unassigned_sectors: batch
                .incidents
                .iter()
                .filter(|i| i.sector == UNASSIGNED_SECTOR)
                .count(),
        };
        tracing::debug!(?stats, "source normalized");

        Ok((batch, stats))
    }
}

pub fn read_source(origin: Origin, path: &Path) -> Result<SourceTable, IngestError> {
    SourceTable::from_path(path).map_err(|source| IngestError::Source { origin, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use incident_core::SlaStatus;

    fn ts(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn pipeline() -> IngestPipeline {
        IngestPipeline::new(IngestConfig::default()).unwrap()
    }

    fn descriptive() -> SourceTable {
        SourceTable::from_bytes(
            "Exibir ID,Descrição,Data de criação,Nome do grupo designado\n\
             D-1,\"Cliente sem acesso\nTipo da falha: Timeout de conexão\",17 de dez. de 2025 14:46:02,TCLOUD-DEVOPS-PROTHEUS\n\
             D-2,Sem classificação,18 de dez. de 2025 09:00:00,\n"
                .as_bytes(),
        )
        .unwrap()
    }

    fn ticketing() -> SourceTable {
        SourceTable::from_bytes(
            "Número;Assunto;Data Hora de Abertura;Resolver até;Equipe Responsável\n\
             T-1;Indisponibilidade - ERP;19/12/2025 08:00;19/12/2025 12:00;DBA\n\
             T-2;Lentidão;19/12/2025 10:30;amanhã;DBA\n"
                .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_run_unifies_both_sources() {
        let run = pipeline().run(&descriptive(), &ticketing(), ts(19, 11, 0)).unwrap();
        let ids: Vec<&str> = run.incidents.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["T-2", "T-1", "D-2", "D-1"]);
        assert_eq!(run.summary.total, 4);

        let d1 = run.incidents.iter().find(|i| i.id == "D-1").unwrap();
        assert_eq!(d1.failure_type, "Timeout de conexão");
        assert_eq!(
            d1.opened_at,
            NaiveDate::from_ymd_opt(2025, 12, 17).and_then(|d| d.and_hms_opt(14, 46, 2))
        );
        assert_eq!(d1.sla_status, SlaStatus::Overdue);

        let d2 = run.incidents.iter().find(|i| i.id == "D-2").unwrap();
        assert_eq!(d2.failure_type, UNIDENTIFIED_FAILURE);
        assert_eq!(d2.sector, UNASSIGNED_SECTOR);
    }

    #[test]
    fn test_deadlines_explicit_or_window() {
        let run = pipeline().run(&descriptive(), &ticketing(), ts(19, 11, 0)).unwrap();
        let t1 = run.incidents.iter().find(|i| i.id == "T-1").unwrap();
        assert_eq!(t1.due_at, Some(ts(19, 12, 0)));
        assert_eq!(t1.sla_status, SlaStatus::OnTime);

        let t2 = run.incidents.iter().find(|i| i.id == "T-2").unwrap();
        assert_eq!(t2.due_at, Some(ts(20, 10, 30)));

        let stats = run
            .summary
            .sources
            .iter()
            .find(|s| s.origin == Origin::Ticketing)
            .unwrap();
        assert_eq!(stats.explicit_deadlines, 1);
        assert_eq!(stats.derived_deadlines, 1);
        assert_eq!(stats.unparsed_due_at, 1);
        assert_eq!(stats.opened_at_strategy, ParseStrategy::Generic);
    }

    #[test]
    fn test_schema_errors_from_both_sources_reported_together() {
        let bad_desc = SourceTable::from_bytes(b"Foo,Bar\n1,2\n").unwrap();
        let bad_tick = SourceTable::from_bytes(b"Assunto,Data Hora de Abertura\nx,y\n").unwrap();
        let err = pipeline().run(&bad_desc, &bad_tick, ts(1, 0, 0)).unwrap_err();
        match err {
            IngestError::Schema(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].0, Origin::Descriptive);
                assert!(errors[1].1.names(CanonicalField::Id));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_process_source_reports_locale_strategy() {
        let (incidents, stats) = pipeline()
            .process_source(Origin::Descriptive, &descriptive(), ts(1, 0, 0))
            .unwrap();
        assert_eq!(incidents.len(), 2);
        assert_eq!(stats.opened_at_strategy, ParseStrategy::LocaleFallback);
        assert_eq!(stats.unidentified_failures, 1);
        assert_eq!(stats.unassigned_sectors, 1);
        assert_eq!(stats.derived_deadlines, 2);
    }

    #[test]
    fn test_failed_run_leaves_store_untouched() {
        let store = IncidentStore::open_in_memory().unwrap();
        let p = pipeline();
        p.ingest(&descriptive(), &ticketing(), &store, ts(19, 11, 0)).unwrap();
        assert_eq!(store.count().unwrap(), 4);

        let bad = SourceTable::from_bytes(b"Foo\n1\n").unwrap();
        assert!(p.ingest(&bad, &ticketing(), &store, ts(19, 11, 0)).is_err());
        assert_eq!(store.count().unwrap(), 4);
    }
}
