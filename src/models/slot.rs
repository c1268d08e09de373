use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::models::interview::InterviewMode;
use crate::utils::time::overlaps;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SlotWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub label: String,
}

impl SlotWindow {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
            label: format!(
                "{} - {}",
                start_time.format("%H:%M"),
                end_time.format("%H:%M")
            ),
        }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        overlaps(self.start_time, self.end_time, start, end)
    }
}

#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub interviewer_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_minutes: i64,
    pub mode: InterviewMode,
}

/// Reconciled availability. `Empty` is a normal outcome, distinct from a provider failure.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotAvailability {
    Available(BTreeMap<NaiveDate, Vec<SlotWindow>>),
    Empty,
}

impl SlotAvailability {
    pub fn is_empty(&self) -> bool {
        matches!(self, SlotAvailability::Empty)
    }

    pub fn windows(&self) -> impl Iterator<Item = &SlotWindow> {
        let groups = match self {
            SlotAvailability::Available(groups) => Some(groups),
            SlotAvailability::Empty => None,
        };
        groups.into_iter().flat_map(|g| g.values().flatten())
    }
}
