use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Placeholder failure type when nothing could be extracted
pub const UNIDENTIFIED_FAILURE: &str = "Unidentified";

/// Placeholder sector when the owning team is blank or unknown
pub const UNASSIGNED_SECTOR: &str = "Unassigned";

/// Source system that produced an incident
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Free-text export, failure type buried in the description
    Descriptive,
    /// Structured ticketing export with subject and deadline columns
    Ticketing,
}

impl Origin {
    pub const ALL: [Origin; 2] = [Origin::Descriptive, Origin::Ticketing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Descriptive => "descriptive",
            Origin::Ticketing => "ticketing",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "descriptive" => Ok(Origin::Descriptive),
            "ticketing" => Ok(Origin::Ticketing),
            other => Err(format!("unknown origin: {}", other)),
        }
    }
}

/// Binary SLA classification. Always derived from `due_at` and the clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    OnTime,
    Overdue,
}

impl SlaStatus {
    /// Overdue iff a deadline exists and is strictly before `now`.
    /// A missing deadline is never a breach.
    pub fn evaluate(due_at: Option<NaiveDateTime>, now: NaiveDateTime) -> Self {
        match due_at {
            Some(due) if due < now => SlaStatus::Overdue,
            _ => SlaStatus::OnTime,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlaStatus::OnTime => "on_time",
            SlaStatus::Overdue => "overdue",
        }
    }

    pub fn is_overdue(&self) -> bool {
        matches!(self, SlaStatus::Overdue)
    }
}

impl fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "on_time" => Ok(SlaStatus::OnTime),
            "overdue" => Ok(SlaStatus::Overdue),
            other => Err(format!("unknown sla status: {}", other)),
        }
    }
}

/// Source-agnostic incident record produced by normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalIncident {
    /// Unique per source only; used as the persistence key
    pub id: String,
    pub failure_type: String,
    pub sector: String,
    pub opened_at: Option<NaiveDateTime>,
    pub due_at: Option<NaiveDateTime>,
    pub origin: Origin,
    /// Snapshot of the status at the last evaluation; call `refresh_sla` before trusting it
    pub sla_status: SlaStatus,
    pub description: String,
}

impl CanonicalIncident {
    /// Recompute `sla_status` against `now`
    pub fn refresh_sla(&mut self, now: NaiveDateTime) {
        self.sla_status = SlaStatus::evaluate(self.due_at, now);
    }

    pub fn with_sla(mut self, now: NaiveDateTime) -> Self {
        self.refresh_sla(now);
        self
    }

    pub fn is_overdue(&self) -> bool {
        self.sla_status.is_overdue()
    }
}

/// Stable sort: newest `opened_at` first, incidents without an opening date last
pub fn order_newest_first(incidents: &mut [CanonicalIncident]) {
    incidents.sort_by(|a, b| compare_opened_desc(a.opened_at, b.opened_at));
}

fn compare_opened_desc(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ts(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn incident(id: &str, opened_at: Option<NaiveDateTime>) -> CanonicalIncident {
        CanonicalIncident {
            id: id.to_string(),
            failure_type: UNIDENTIFIED_FAILURE.to_string(),
            sector: UNASSIGNED_SECTOR.to_string(),
            opened_at,
            due_at: opened_at.map(|o| o + Duration::hours(24)),
            origin: Origin::Descriptive,
            sla_status: SlaStatus::OnTime,
            description: String::new(),
        }
    }

    #[test]
    fn test_status_flips_exactly_at_deadline() {
        let due = ts(17, 14, 46, 2);

        assert_eq!(SlaStatus::evaluate(Some(due), due), SlaStatus::OnTime);
        assert_eq!(
            SlaStatus::evaluate(Some(due), due - Duration::seconds(1)),
            SlaStatus::OnTime
        );
        assert_eq!(
            SlaStatus::evaluate(Some(due), due + Duration::nanoseconds(1)),
            SlaStatus::Overdue
        );
    }

    #[test]
    fn test_missing_deadline_is_never_overdue() {
        assert_eq!(SlaStatus::evaluate(None, ts(31, 23, 59, 59)), SlaStatus::OnTime);
    }

    #[test]
    fn test_refresh_sla_uses_new_clock() {
        let mut inc = incident("INC-1", Some(ts(1, 8, 0, 0)));
        inc.refresh_sla(ts(1, 9, 0, 0));
        assert!(!inc.is_overdue());

        inc.refresh_sla(ts(3, 9, 0, 0));
        assert!(inc.is_overdue());
    }

    #[test]
    fn test_order_newest_first_puts_nulls_last() {
        let mut list = vec![
            incident("a", None),
            incident("b", Some(ts(1, 0, 0, 0))),
            incident("c", Some(ts(5, 0, 0, 0))),
            incident("d", None),
            incident("e", Some(ts(3, 0, 0, 0))),
        ];
        order_newest_first(&mut list);

        let ids: Vec<_> = list.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "e", "b", "a", "d"]);
    }

    #[test]
    fn test_origin_round_trips_through_text() {
        for origin in Origin::ALL {
            assert_eq!(origin.as_str().parse::<Origin>().unwrap(), origin);
        }
        assert!("legacy".parse::<Origin>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SlaStatus::OnTime).unwrap();
        assert_eq!(json, "\"on_time\"");
    }
}
