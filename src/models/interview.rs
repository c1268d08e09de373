use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::time::overlaps;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "interview_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Pending,
    Scheduled,
    Confirmed,
    Rescheduled,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl InterviewStatus {
    pub const ALL: [InterviewStatus; 8] = [
        InterviewStatus::Pending,
        InterviewStatus::Scheduled,
        InterviewStatus::Confirmed,
        InterviewStatus::Rescheduled,
        InterviewStatus::InProgress,
        InterviewStatus::Completed,
        InterviewStatus::Cancelled,
        InterviewStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Pending => "pending",
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::Confirmed => "confirmed",
            InterviewStatus::Rescheduled => "rescheduled",
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Cancelled => "cancelled",
            InterviewStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InterviewStatus::Completed | InterviewStatus::Cancelled | InterviewStatus::Rejected
        )
    }

    /// Statuses that keep the interviewer's calendar window reserved.
    pub fn holds_slot(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InterviewStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown interview status: {}", s))
    }
}

/// Which party conducts the interview. Wire codes are `AI`, `HR` and `HM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "interview_mode")]
pub enum InterviewMode {
    #[sqlx(rename = "AI")]
    #[serde(rename = "AI")]
    Ai,
    #[sqlx(rename = "HR")]
    #[serde(rename = "HR")]
    Hr,
    #[sqlx(rename = "HM")]
    #[serde(rename = "HM", alias = "HiringManager")]
    HiringManager,
}

impl InterviewMode {
    pub fn code(&self) -> &'static str {
        match self {
            InterviewMode::Ai => "AI",
            InterviewMode::Hr => "HR",
            InterviewMode::HiringManager => "HM",
        }
    }

    pub fn needs_slot(&self) -> bool {
        !matches!(self, InterviewMode::Ai)
    }
}

impl fmt::Display for InterviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for InterviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AI" => Ok(InterviewMode::Ai),
            "HR" => Ok(InterviewMode::Hr),
            "HM" | "HiringManager" => Ok(InterviewMode::HiringManager),
            other => Err(format!("unknown interview mode: {}", other)),
        }
    }
}

/// Side of a reschedule negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "interview_party", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Candidate,
    Interviewer,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Candidate => f.write_str("candidate"),
            Party::Interviewer => f.write_str("interviewer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "interview_result", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InterviewResult {
    Passed,
    Failed,
    OnHold,
}

/// Actions that move an interview between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InterviewEvent {
    Accept,
    Reject,
    RequestReschedule,
    AcceptReschedule,
    RejectReschedule,
    Start,
    Complete,
    Cancel,
}

impl InterviewEvent {
    pub const ALL: [InterviewEvent; 8] = [
        InterviewEvent::Accept,
        InterviewEvent::Reject,
        InterviewEvent::RequestReschedule,
        InterviewEvent::AcceptReschedule,
        InterviewEvent::RejectReschedule,
        InterviewEvent::Start,
        InterviewEvent::Complete,
        InterviewEvent::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewEvent::Accept => "accept",
            InterviewEvent::Reject => "reject",
            InterviewEvent::RequestReschedule => "request_reschedule",
            InterviewEvent::AcceptReschedule => "accept_reschedule",
            InterviewEvent::RejectReschedule => "reject_reschedule",
            InterviewEvent::Start => "start",
            InterviewEvent::Complete => "complete",
            InterviewEvent::Cancel => "cancel",
        }
    }
}

impl fmt::Display for InterviewEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            InterviewEvent::RequestReschedule => "request a reschedule of",
            InterviewEvent::AcceptReschedule => "accept a reschedule of",
            InterviewEvent::RejectReschedule => "reject a reschedule of",
            other => other.as_str(),
        };
        f.write_str(phrase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Interview {
    pub id: Uuid,
    pub application_id: String,
    pub job_id: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub mode: InterviewMode,
    pub status: InterviewStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub meeting_link: Option<String>,
    pub interviewer_id: Option<String>,
    pub interviewer_email: Option<String>,
    pub interviewer_name: Option<String>,
    pub requested_time: Option<DateTime<Utc>>,
    pub requested_end_time: Option<DateTime<Utc>>,
    pub reschedule_reason: Option<String>,
    pub reschedule_count: i32,
    pub reschedule_requested_by: Option<Party>,
    pub reschedule_rejection_reason: Option<String>,
    pub status_before_reschedule: Option<InterviewStatus>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub result: Option<InterviewResult>,
    pub comments: Option<String>,
    pub suggestion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    #[serde(skip_serializing)]
    pub idempotency_key: Option<String>,
}

impl Interview {
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn requested_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.requested_time, self.requested_end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// True when this interview reserves interviewer time overlapping `[start, end)`.
    pub fn blocks(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if !self.status.holds_slot() {
            return false;
        }
        match self.window() {
            Some((s, e)) => overlaps(s, e, start, end),
            None => false,
        }
    }

    pub fn is_candidate(&self, email: &str) -> bool {
        self.candidate_email.eq_ignore_ascii_case(email.trim())
    }

    pub fn is_interviewer(&self, user_id: &str) -> bool {
        self.interviewer_id.as_deref() == Some(user_id)
    }
}

/// One applied status change, kept as history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InterviewTransition {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub from_status: Option<InterviewStatus>,
    pub to_status: InterviewStatus,
    pub event: String,
    pub actor_id: Option<String>,
    pub actor_role: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InterviewTransition {
    pub fn record(
        interview: &Interview,
        from_status: Option<InterviewStatus>,
        event: &str,
        actor_id: Option<String>,
        actor_role: Option<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            interview_id: interview.id,
            from_status,
            to_status: interview.status,
            event: event.to_string(),
            actor_id,
            actor_role,
            reason,
            created_at: interview.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip_through_from_str() {
        for status in InterviewStatus::ALL {
            assert_eq!(status.as_str().parse::<InterviewStatus>(), Ok(status));
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json.as_str(), Some(status.as_str()));
        }
        assert!("done".parse::<InterviewStatus>().is_err());
    }

    #[test]
    fn mode_accepts_long_hiring_manager_name() {
        let mode: InterviewMode = serde_json::from_str("\"HiringManager\"").unwrap();
        assert_eq!(mode, InterviewMode::HiringManager);
        assert_eq!(serde_json::to_string(&mode).unwrap(), "\"HM\"");
    }

    #[test]
    fn only_non_terminal_statuses_hold_slots() {
        let held: Vec<_> = InterviewStatus::ALL
            .into_iter()
            .filter(|s| s.holds_slot())
            .collect();
        assert_eq!(held.len(), 5);
        assert!(!InterviewStatus::Cancelled.holds_slot());
    }
}
