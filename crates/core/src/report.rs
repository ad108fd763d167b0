//! Reporting contract
//!
//! What the pipeline hands to a dashboard: the incident sequence, the
//! distinct sectors and origins available for filtering, aggregate SLA
//! counts for any filtered subset, and per-key breakdowns for charts.
//! Every count here is evaluated against an explicit clock.

use crate::incident::{order_newest_first, CanonicalIncident, Origin, SlaStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Filter
// ============================================================================

/// Sector/origin selection. `None` selects everything; an empty set selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sectors: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origins: Option<BTreeSet<Origin>>,
}

impl IncidentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_sectors<I, S>(mut self, sectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sectors = Some(sectors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_origins<I>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = Origin>,
    {
        self.origins = Some(origins.into_iter().collect());
        self
    }

    /// Default sector selection: the preferred sectors that actually occur
    /// in the data, or every sector when none of them do.
    pub fn with_preferred_sectors(available: &BTreeSet<String>, preferred: &[String]) -> Self {
        let present: BTreeSet<String> = preferred
            .iter()
            .filter(|s| available.contains(s.as_str()))
            .cloned()
            .collect();

        if present.is_empty() {
            Self::all()
        } else {
            Self {
                sectors: Some(present),
                origins: None,
            }
        }
    }

    /// True when the caller explicitly selected no sector or no origin
    pub fn is_empty_selection(&self) -> bool {
        self.sectors.as_ref().is_some_and(|s| s.is_empty())
            || self.origins.as_ref().is_some_and(|o| o.is_empty())
    }

    pub fn matches(&self, incident: &CanonicalIncident) -> bool {
        let sector_ok = self
            .sectors
            .as_ref()
            .map_or(true, |s| s.contains(&incident.sector));
        let origin_ok = self
            .origins
            .as_ref()
            .map_or(true, |o| o.contains(&incident.origin));
        sector_ok && origin_ok
    }

    pub fn apply<'a>(&self, incidents: &'a [CanonicalIncident]) -> Vec<&'a CanonicalIncident> {
        incidents.iter().filter(|i| self.matches(i)).collect()
    }
}

// ============================================================================
// Aggregates
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaSummary {
    pub total: usize,
    pub overdue: usize,
    pub on_time: usize,
}

impl SlaSummary {
    /// Count statuses as of `now`, ignoring whatever status the records carry
    pub fn at<'a, I>(incidents: I, now: NaiveDateTime) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalIncident>,
    {
        let mut summary = Self::default();
        for incident in incidents {
            summary.total += 1;
            match SlaStatus::evaluate(incident.due_at, now) {
                SlaStatus::Overdue => summary.overdue += 1,
                SlaStatus::OnTime => summary.on_time += 1,
            }
        }
        summary
    }
}

pub fn distinct_sectors(incidents: &[CanonicalIncident]) -> BTreeSet<String> {
    incidents.iter().map(|i| i.sector.clone()).collect()
}

pub fn distinct_origins(incidents: &[CanonicalIncident]) -> BTreeSet<Origin> {
    incidents.iter().map(|i| i.origin).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub key: String,
    pub count: usize,
}

/// Value counts, highest first, ties broken by key
pub fn breakdown_by<'a, I, F>(incidents: I, key: F) -> Vec<BreakdownEntry>
where
    I: IntoIterator<Item = &'a CanonicalIncident>,
    F: Fn(&CanonicalIncident) -> &str,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for incident in incidents {
        *counts.entry(key(incident)).or_insert(0) += 1;
    }

    let mut entries: Vec<BreakdownEntry> = counts
        .into_iter()
        .map(|(k, count)| BreakdownEntry {
            key: k.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    entries
}

pub fn breakdown_by_failure_type<'a, I>(incidents: I) -> Vec<BreakdownEntry>
where
    I: IntoIterator<Item = &'a CanonicalIncident>,
{
    breakdown_by(incidents, |i| i.failure_type.as_str())
}

pub fn breakdown_by_sector<'a, I>(incidents: I) -> Vec<BreakdownEntry>
where
    I: IntoIterator<Item = &'a CanonicalIncident>,
{
    breakdown_by(incidents, |i| i.sector.as_str())
}

// ============================================================================
// Dashboard bundle
// ============================================================================

/// Everything a dashboard render needs, computed in one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub generated_at: NaiveDateTime,
    pub filter: IncidentFilter,
    /// Facets over the whole history, not just the filtered view
    pub sectors: BTreeSet<String>,
    pub origins: BTreeSet<Origin>,
    pub summary: SlaSummary,
    pub by_failure_type: Vec<BreakdownEntry>,
    pub by_sector: Vec<BreakdownEntry>,
    pub incidents: Vec<CanonicalIncident>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Dashboard {
    pub fn build(
        mut incidents: Vec<CanonicalIncident>,
        filter: &IncidentFilter,
        now: NaiveDateTime,
    ) -> Self {
        for incident in incidents.iter_mut() {
            incident.refresh_sla(now);
        }
        order_newest_first(&mut incidents);

        let sectors = distinct_sectors(&incidents);
        let origins = distinct_origins(&incidents);

        let mut warnings = Vec::new();
        if filter.is_empty_selection() {
            warnings.push("Select at least one sector and one origin".to_string());
        }

        let view: Vec<CanonicalIncident> = incidents
            .into_iter()
            .filter(|i| filter.matches(i))
            .collect();

        Self {
            generated_at: now,
            filter: filter.clone(),
            sectors,
            origins,
            summary: SlaSummary::at(&view, now),
            by_failure_type: breakdown_by_failure_type(&view),
            by_sector: breakdown_by_sector(&view),
            incidents: view,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::{UNASSIGNED_SECTOR, UNIDENTIFIED_FAILURE};
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn incident(
        id: &str,
        sector: &str,
        origin: Origin,
        failure: &str,
        due_in_hours: Option<i64>,
    ) -> CanonicalIncident {
        CanonicalIncident {
            id: id.to_string(),
            failure_type: failure.to_string(),
            sector: sector.to_string(),
            opened_at: due_in_hours.map(|h| now() + Duration::hours(h - 24)),
            due_at: due_in_hours.map(|h| now() + Duration::hours(h)),
            origin,
            sla_status: SlaStatus::OnTime,
            description: String::new(),
        }
    }

    fn sample() -> Vec<CanonicalIncident> {
        vec![
            incident("1", "NOC", Origin::Descriptive, "Timeout", Some(-2)),
            incident("2", "NOC", Origin::Ticketing, "Timeout", Some(5)),
            incident("3", "DBA", Origin::Ticketing, "Disk full", Some(-30)),
            incident("4", UNASSIGNED_SECTOR, Origin::Descriptive, UNIDENTIFIED_FAILURE, None),
        ]
    }

    #[test]
    fn test_summary_counts_against_clock() {
        let all = sample();
        let summary = SlaSummary::at(&all, now());
        assert_eq!(summary.total, 4);
        assert_eq!(summary.overdue, 2);
        assert_eq!(summary.on_time, 2);

        // Move the clock past the remaining deadline
        let later = SlaSummary::at(&all, now() + Duration::hours(6));
        assert_eq!(later.overdue, 3);
    }

    #[test]
    fn test_filter_by_sector_and_origin() {
        let all = sample();
        let filter = IncidentFilter::all()
            .with_sectors(["NOC"])
            .with_origins([Origin::Ticketing]);
        let view = filter.apply(&all);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, "2");
    }

    #[test]
    fn test_empty_selection_yields_nothing() {
        let all = sample();
        let filter = IncidentFilter::all().with_sectors(Vec::<String>::new());
        assert!(filter.is_empty_selection());
        assert!(filter.apply(&all).is_empty());
    }

    #[test]
    fn test_preferred_sectors_fall_back_to_all() {
        let sectors = distinct_sectors(&sample());

        let preferred = IncidentFilter::with_preferred_sectors(&sectors, &["DBA".to_string()]);
        assert_eq!(
            preferred.sectors,
            Some(BTreeSet::from(["DBA".to_string()]))
        );

        let fallback =
            IncidentFilter::with_preferred_sectors(&sectors, &["TCLOUD-DEVOPS".to_string()]);
        assert_eq!(fallback, IncidentFilter::all());
    }

    #[test]
    fn test_breakdown_orders_by_count_then_key() {
        let all = sample();
        let by_failure = breakdown_by_failure_type(&all);
        assert_eq!(by_failure[0].key, "Timeout");
        assert_eq!(by_failure[0].count, 2);
        assert_eq!(by_failure[1].key, "Disk full");
        assert_eq!(by_failure[2].key, UNIDENTIFIED_FAILURE);
    }

    #[test]
    fn test_dashboard_facets_cover_full_history() {
        let filter = IncidentFilter::all().with_sectors(["DBA"]);
        let dash = Dashboard::build(sample(), &filter, now());

        assert_eq!(dash.incidents.len(), 1);
        assert_eq!(dash.sectors.len(), 3);
        assert_eq!(dash.origins.len(), 2);
        assert_eq!(dash.summary.overdue, 1);
        assert!(dash.incidents[0].is_overdue());
        assert!(dash.warnings.is_empty());
    }
}
