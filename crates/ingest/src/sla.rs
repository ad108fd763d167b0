//! SLA deadline derivation
//!
//! A deadline is the explicit source value when it parses, otherwise the
//! opening time plus the resolution window. Status evaluation itself lives
//! on `incident_core::SlaStatus` so readers can recompute it anywhere.

use crate::dates::DateOutcome;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RESOLUTION_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaPolicy {
    resolution_window: Duration,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self::from_hours(DEFAULT_RESOLUTION_WINDOW_HOURS)
    }
}

impl SlaPolicy {
    pub fn new(resolution_window: Duration) -> Self {
        Self { resolution_window }
    }

    pub fn from_hours(hours: i64) -> Self {
        Self::new(Duration::hours(hours))
    }

    pub fn resolution_window(&self) -> Duration {
        self.resolution_window
    }

    pub fn derive(&self, opened_at: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
        opened_at.and_then(|t| t.checked_add_signed(self.resolution_window))
    }

    /// One deadline per row. `explicit` is `None` when the source has no
    /// deadline column; otherwise it must be row-aligned with `opened_at`.
    pub fn deadlines(
        &self,
        opened_at: &[Option<NaiveDateTime>],
        explicit: Option<&[DateOutcome]>,
    ) -> Vec<Deadline> {
        opened_at
            .iter()
            .enumerate()
            .map(|(i, opened)| {
                let given = explicit.and_then(|e| e.get(i)).and_then(DateOutcome::value);
                match given {
                    Some(due) => Deadline::explicit(due),
                    None => Deadline::derived(self.derive(*opened)),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineSource {
    Explicit,
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub due_at: Option<NaiveDateTime>,
    pub source: DeadlineSource,
}

impl Deadline {
    pub fn explicit(due_at: NaiveDateTime) -> Self {
        Self {
            due_at: Some(due_at),
            source: DeadlineSource::Explicit,
        }
    }

    pub fn derived(due_at: Option<NaiveDateTime>) -> Self {
        Self {
            due_at,
            source: DeadlineSource::Derived,
        }
    }

    pub fn is_derived(&self) -> bool {
        self.source == DeadlineSource::Derived
    }
}
