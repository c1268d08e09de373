//! Interview status transitions.
//!
//! Every status change goes through [`apply`], which checks the transition
//! table, the payload and the start window, and returns the updated record.
//! Nothing here touches storage; callers persist the result with a
//! conditional write against the status they read.

use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};
use crate::models::interview::{
    Interview, InterviewEvent, InterviewMode, InterviewResult, InterviewStatus, Party,
};

/// How far around the booked window an interviewer may press "start".
#[derive(Debug, Clone, Copy)]
pub struct StartPolicy {
    pub early: Duration,
    pub grace: Duration,
}

impl StartPolicy {
    pub fn new(early_minutes: i64, grace_minutes: i64) -> Self {
        Self {
            early: Duration::minutes(early_minutes),
            grace: Duration::minutes(grace_minutes),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.start_early_minutes, config.start_grace_minutes)
    }

    fn check(&self, interview: &Interview, now: DateTime<Utc>) -> std::result::Result<(), String> {
        let Some((start, end)) = interview.window() else {
            // AI screens have no booked window.
            return Ok(());
        };
        if now < start - self.early {
            return Err(format!(
                "not yet startable; opens at {}",
                (start - self.early).to_rfc3339()
            ));
        }
        if now > end + self.grace {
            return Err(format!(
                "start window closed at {}",
                (end + self.grace).to_rfc3339()
            ));
        }
        Ok(())
    }
}

impl Default for StartPolicy {
    fn default() -> Self {
        Self::new(15, 60)
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Accept,
    Reject {
        reason: Option<String>,
    },
    RequestReschedule {
        by: Party,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        reason: String,
    },
    AcceptReschedule {
        by: Party,
    },
    RejectReschedule {
        by: Party,
        reason: String,
    },
    Start,
    Complete {
        result: Option<InterviewResult>,
        comments: Option<String>,
        suggestion: Option<String>,
    },
    Cancel {
        reason: Option<String>,
    },
}

impl Command {
    pub fn event(&self) -> InterviewEvent {
        match self {
            Command::Accept => InterviewEvent::Accept,
            Command::Reject { .. } => InterviewEvent::Reject,
            Command::RequestReschedule { .. } => InterviewEvent::RequestReschedule,
            Command::AcceptReschedule { .. } => InterviewEvent::AcceptReschedule,
            Command::RejectReschedule { .. } => InterviewEvent::RejectReschedule,
            Command::Start => InterviewEvent::Start,
            Command::Complete { .. } => InterviewEvent::Complete,
            Command::Cancel { .. } => InterviewEvent::Cancel,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Command::Reject { reason } | Command::Cancel { reason } => reason.as_deref(),
            Command::RequestReschedule { reason, .. }
            | Command::RejectReschedule { reason, .. } => {
                Some(reason.as_str())
            }
            _ => None,
        }
    }
}

/// The transition table. Reschedule resolution returns to the status saved
/// when the request was filed, so it has no fixed target here.
pub fn permits(status: InterviewStatus, event: InterviewEvent) -> bool {
    use InterviewEvent as E;
    use InterviewStatus as S;

    match event {
        E::Accept | E::Reject => matches!(status, S::Pending | S::Scheduled),
        E::RequestReschedule => matches!(status, S::Scheduled | S::Confirmed),
        E::AcceptReschedule | E::RejectReschedule => status == S::Rescheduled,
        E::Start => matches!(status, S::Scheduled | S::Confirmed),
        E::Complete => status == S::InProgress,
        E::Cancel => !status.is_terminal(),
    }
}

/// Events the record accepts right now, including the start window.
pub fn allowed_events(
    interview: &Interview,
    now: DateTime<Utc>,
    policy: &StartPolicy,
) -> Vec<InterviewEvent> {
    InterviewEvent::ALL
        .into_iter()
        .filter(|event| permits(interview.status, *event))
        .filter(|event| match event {
            InterviewEvent::Start => policy.check(interview, now).is_ok(),
            InterviewEvent::RequestReschedule
            | InterviewEvent::AcceptReschedule
            | InterviewEvent::RejectReschedule => interview.mode.needs_slot(),
            _ => true,
        })
        .collect()
}

fn invalid(
    interview: &Interview,
    event: InterviewEvent,
    now: DateTime<Utc>,
    policy: &StartPolicy,
) -> Error {
    Error::invalid_transition(interview.status, event, allowed_events(interview, now, policy))
}

fn required_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Applies `command` to a copy of `interview`.
///
/// Errors leave the input untouched. `version` and `updated_at` are bumped on
/// success so the caller can persist the record as-is.
pub fn apply(
    interview: &Interview,
    command: &Command,
    now: DateTime<Utc>,
    policy: &StartPolicy,
) -> Result<Interview> {
    let event = command.event();

    if event == InterviewEvent::RequestReschedule {
        if interview.mode == InterviewMode::Ai {
            return Err(Error::Validation(
                "AI interviews cannot be rescheduled".to_string(),
            ));
        }
        if interview.status == InterviewStatus::Rescheduled {
            return Err(Error::ConflictingRequest);
        }
    }

    if !permits(interview.status, event) {
        return Err(invalid(interview, event, now, policy));
    }

    let mut next = interview.clone();

    match command {
        Command::Accept => {
            next.status = InterviewStatus::Confirmed;
            next.confirmed_at.get_or_insert(now);
        }
        Command::Reject { reason } => {
            next.status = InterviewStatus::Rejected;
            next.rejection_reason = optional_text(reason);
            next.ended_at.get_or_insert(now);
        }
        Command::RequestReschedule {
            by,
            start_time,
            end_time,
            reason,
        } => {
            let reason = required_text(reason, "reschedule reason")?;
            if start_time >= end_time {
                return Err(Error::Validation(
                    "start_time must be before end_time".to_string(),
                ));
            }
            if *start_time <= now {
                return Err(Error::Validation(
                    "the requested time must be in the future".to_string(),
                ));
            }
            if interview.window() == Some((*start_time, *end_time)) {
                return Err(Error::Validation(
                    "the requested time matches the current booking".to_string(),
                ));
            }
            next.status_before_reschedule = Some(interview.status);
            next.status = InterviewStatus::Rescheduled;
            next.requested_time = Some(*start_time);
            next.requested_end_time = Some(*end_time);
            next.reschedule_reason = Some(reason);
            next.reschedule_requested_by = Some(*by);
            next.reschedule_rejection_reason = None;
        }
        Command::AcceptReschedule { by } => {
            check_resolver(interview, *by)?;
            let (start, end) = interview.requested_window().ok_or_else(|| {
                Error::Internal(format!(
                    "interview {} is rescheduled without a requested time",
                    interview.id
                ))
            })?;
            next.start_time = Some(start);
            next.end_time = Some(end);
            next.status = restore_status(interview);
            next.reschedule_count += 1;
            clear_request(&mut next);
        }
        Command::RejectReschedule { by, reason } => {
            check_resolver(interview, *by)?;
            let reason = required_text(reason, "rejection reason")?;
            next.status = restore_status(interview);
            next.reschedule_rejection_reason = Some(reason);
            clear_request(&mut next);
        }
        Command::Start => {
            if let Err(detail) = policy.check(interview, now) {
                return Err(Error::InvalidStateTransition {
                    current: interview.status,
                    event,
                    allowed: allowed_events(interview, now, policy),
                    detail: Some(detail),
                });
            }
            next.status = InterviewStatus::InProgress;
            next.started_at.get_or_insert(now);
        }
        Command::Complete {
            result,
            comments,
            suggestion,
        } => {
            let result = result.ok_or_else(|| {
                Error::Validation("result is required to complete an interview".to_string())
            })?;
            next.status = InterviewStatus::Completed;
            next.result = Some(result);
            next.comments = optional_text(comments);
            next.suggestion = optional_text(suggestion);
            next.ended_at.get_or_insert(now);
        }
        Command::Cancel { reason } => {
            next.status = InterviewStatus::Cancelled;
            next.cancellation_reason = optional_text(reason);
            next.cancelled_at.get_or_insert(now);
            clear_request(&mut next);
        }
    }

    next.version = interview.version + 1;
    next.updated_at = now;
    Ok(next)
}

fn check_resolver(interview: &Interview, by: Party) -> Result<()> {
    match interview.reschedule_requested_by {
        Some(proposer) if proposer == by => Err(Error::Forbidden(format!(
            "the {} who requested the reschedule cannot resolve it",
            by
        ))),
        _ => Ok(()),
    }
}

fn restore_status(interview: &Interview) -> InterviewStatus {
    match interview.status_before_reschedule {
        Some(status @ (InterviewStatus::Scheduled | InterviewStatus::Confirmed)) => status,
        _ => InterviewStatus::Scheduled,
    }
}

fn clear_request(interview: &mut Interview) {
    interview.requested_time = None;
    interview.requested_end_time = None;
    interview.status_before_reschedule = None;
    interview.reschedule_requested_by = None;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    pub(crate) fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    pub(crate) fn interview(status: InterviewStatus) -> Interview {
        let created = at(8, 0);
        Interview {
            id: Uuid::new_v4(),
            application_id: "app-1".into(),
            job_id: "job-1".into(),
            candidate_name: "Ada Lovelace".into(),
            candidate_email: "ada@example.com".into(),
            mode: InterviewMode::Hr,
            status,
            start_time: Some(at(10, 0)),
            end_time: Some(at(11, 0)),
            meeting_link: Some("https://meet.example.com/abc".into()),
            interviewer_id: Some("hr-1".into()),
            interviewer_email: Some("hr@example.com".into()),
            interviewer_name: Some("Grace".into()),
            requested_time: None,
            requested_end_time: None,
            reschedule_reason: None,
            reschedule_count: 0,
            reschedule_requested_by: None,
            reschedule_rejection_reason: None,
            status_before_reschedule: None,
            rejection_reason: None,
            cancellation_reason: None,
            result: None,
            comments: None,
            suggestion: None,
            created_at: created,
            scheduled_at: Some(created),
            confirmed_at: None,
            started_at: None,
            ended_at: None,
            cancelled_at: None,
            updated_at: created,
            version: 1,
            idempotency_key: None,
        }
    }

    fn propose(by: Party, start: DateTime<Utc>, end: DateTime<Utc>) -> Command {
        Command::RequestReschedule {
            by,
            start_time: start,
            end_time: end,
            reason: "conflict".into(),
        }
    }

    fn expect_invalid(result: Result<Interview>, expected: InterviewStatus) {
        match result {
            Err(Error::InvalidStateTransition { current, .. }) => assert_eq!(current, expected),
            other => panic!("expected InvalidStateTransition, got {:?}", other),
        }
    }

    #[test]
    fn start_five_minutes_early_moves_to_in_progress() {
        let policy = StartPolicy::default();
        let now = at(9, 55);
        let started = apply(&interview(InterviewStatus::Scheduled), &Command::Start, now, &policy)
            .unwrap();
        assert_eq!(started.status, InterviewStatus::InProgress);
        assert_eq!(started.started_at, Some(now));
        assert_eq!(started.version, 2);
    }

    #[test]
    fn start_before_early_window_is_rejected() {
        let policy = StartPolicy::default();
        let result = apply(
            &interview(InterviewStatus::Confirmed),
            &Command::Start,
            at(9, 44),
            &policy,
        );
        match result {
            Err(Error::InvalidStateTransition { detail: Some(d), allowed, .. }) => {
                assert!(d.contains("not yet startable"));
                assert!(!allowed.contains(&InterviewEvent::Start));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn start_after_grace_window_is_rejected() {
        let policy = StartPolicy::default();
        let result = apply(
            &interview(InterviewStatus::Scheduled),
            &Command::Start,
            at(12, 1),
            &policy,
        );
        expect_invalid(result, InterviewStatus::Scheduled);
        assert!(apply(
            &interview(InterviewStatus::Scheduled),
            &Command::Start,
            at(12, 0),
            &policy
        )
        .is_ok());
    }

    #[test]
    fn ai_interview_starts_without_window() {
        let mut ai = interview(InterviewStatus::Confirmed);
        ai.mode = InterviewMode::Ai;
        ai.start_time = None;
        ai.end_time = None;
        let started = apply(&ai, &Command::Start, at(23, 0), &StartPolicy::default()).unwrap();
        assert_eq!(started.status, InterviewStatus::InProgress);
    }

    #[test]
    fn completing_pending_interview_is_invalid() {
        let result = apply(
            &interview(InterviewStatus::Pending),
            &Command::Complete {
                result: Some(InterviewResult::Passed),
                comments: None,
                suggestion: None,
            },
            at(10, 0),
            &StartPolicy::default(),
        );
        match result {
            Err(Error::InvalidStateTransition { current, event, allowed, .. }) => {
                assert_eq!(current, InterviewStatus::Pending);
                assert_eq!(event, InterviewEvent::Complete);
                assert!(allowed.contains(&InterviewEvent::Accept));
                assert!(allowed.contains(&InterviewEvent::Cancel));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn completing_without_result_is_a_validation_error() {
        let result = apply(
            &interview(InterviewStatus::InProgress),
            &Command::Complete {
                result: None,
                comments: Some("solid".into()),
                suggestion: None,
            },
            at(11, 0),
            &StartPolicy::default(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn completion_records_feedback() {
        let done = apply(
            &interview(InterviewStatus::InProgress),
            &Command::Complete {
                result: Some(InterviewResult::OnHold),
                comments: Some("  good systems knowledge ".into()),
                suggestion: Some(" ".into()),
            },
            at(11, 0),
            &StartPolicy::default(),
        )
        .unwrap();
        assert_eq!(done.status, InterviewStatus::Completed);
        assert_eq!(done.result, Some(InterviewResult::OnHold));
        assert_eq!(done.comments.as_deref(), Some("good systems knowledge"));
        assert_eq!(done.suggestion, None);
        assert_eq!(done.ended_at, Some(at(11, 0)));
    }

    #[test]
    fn candidate_accept_and_reject() {
        let policy = StartPolicy::default();
        let confirmed = apply(
            &interview(InterviewStatus::Pending),
            &Command::Accept,
            at(8, 30),
            &policy,
        )
        .unwrap();
        assert_eq!(confirmed.status, InterviewStatus::Confirmed);
        assert_eq!(confirmed.confirmed_at, Some(at(8, 30)));

        let rejected = apply(
            &interview(InterviewStatus::Scheduled),
            &Command::Reject { reason: Some("took another offer".into()) },
            at(8, 30),
            &policy,
        )
        .unwrap();
        assert_eq!(rejected.status, InterviewStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("took another offer"));

        expect_invalid(
            apply(&confirmed, &Command::Accept, at(8, 40), &policy),
            InterviewStatus::Confirmed,
        );
    }

    #[test]
    fn reschedule_propose_then_accept() {
        let policy = StartPolicy::default();
        let t2 = at(14, 0);
        let proposed = apply(
            &interview(InterviewStatus::Scheduled),
            &propose(Party::Candidate, t2, at(15, 0)),
            at(8, 30),
            &policy,
        )
        .unwrap();
        assert_eq!(proposed.status, InterviewStatus::Rescheduled);
        assert_eq!(proposed.requested_time, Some(t2));
        assert_eq!(proposed.reschedule_reason.as_deref(), Some("conflict"));

        let accepted = apply(
            &proposed,
            &Command::AcceptReschedule { by: Party::Interviewer },
            at(8, 45),
            &policy,
        )
        .unwrap();
        assert_eq!(accepted.status, InterviewStatus::Scheduled);
        assert_eq!(accepted.start_time, Some(t2));
        assert_eq!(accepted.end_time, Some(at(15, 0)));
        assert_eq!(accepted.requested_time, None);
        assert_eq!(accepted.reschedule_count, 1);
    }

    #[test]
    fn accept_restores_confirmed_status() {
        let policy = StartPolicy::default();
        let proposed = apply(
            &interview(InterviewStatus::Confirmed),
            &propose(Party::Interviewer, at(16, 0), at(17, 0)),
            at(8, 30),
            &policy,
        )
        .unwrap();
        let accepted = apply(
            &proposed,
            &Command::AcceptReschedule {
                by: Party::Candidate,
            },
            at(9, 0),
            &policy,
        )
        .unwrap();
        assert_eq!(accepted.status, InterviewStatus::Confirmed);
    }

    #[test]
    fn second_proposal_conflicts() {
        let policy = StartPolicy::default();
        let proposed = apply(
            &interview(InterviewStatus::Scheduled),
            &propose(Party::Candidate, at(14, 0), at(15, 0)),
            at(8, 30),
            &policy,
        )
        .unwrap();
        let again = apply(
            &proposed,
            &propose(Party::Interviewer, at(16, 0), at(17, 0)),
            at(8, 31),
            &policy,
        );
        assert!(matches!(again, Err(Error::ConflictingRequest)));
    }

    #[test]
    fn rejecting_reschedule_keeps_original_window() {
        let policy = StartPolicy::default();
        let original = interview(InterviewStatus::Scheduled);
        let proposed = apply(
            &original,
            &propose(Party::Candidate, at(14, 0), at(15, 0)),
            at(8, 30),
            &policy,
        )
        .unwrap();

        let missing_reason = apply(
            &proposed,
            &Command::RejectReschedule { by: Party::Interviewer, reason: "  ".into() },
            at(8, 40),
            &policy,
        );
        assert!(matches!(missing_reason, Err(Error::Validation(_))));

        let rejected = apply(
            &proposed,
            &Command::RejectReschedule { by: Party::Interviewer, reason: "fully booked".into() },
            at(8, 40),
            &policy,
        )
        .unwrap();
        assert_eq!(rejected.status, InterviewStatus::Scheduled);
        assert_eq!(rejected.start_time, original.start_time);
        assert_eq!(rejected.end_time, original.end_time);
        assert_eq!(rejected.requested_time, None);
        assert_eq!(rejected.reschedule_count, 0);
        assert_eq!(rejected.reschedule_rejection_reason.as_deref(), Some("fully booked"));
    }

    #[test]
    fn proposer_cannot_resolve_own_request() {
        let policy = StartPolicy::default();
        let proposed = apply(
            &interview(InterviewStatus::Scheduled),
            &propose(Party::Candidate, at(14, 0), at(15, 0)),
            at(8, 30),
            &policy,
        )
        .unwrap();
        let result = apply(
            &proposed,
            &Command::AcceptReschedule {
                by: Party::Candidate,
            },
            at(8, 31),
            &policy,
        );
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn proposal_validates_window_and_reason() {
        let policy = StartPolicy::default();
        let base = interview(InterviewStatus::Scheduled);
        let inverted = apply(
            &base,
            &propose(Party::Candidate, at(15, 0), at(14, 0)),
            at(8, 0),
            &policy,
        );
        assert!(matches!(inverted, Err(Error::Validation(_))));

        let past = apply(&base, &propose(Party::Candidate, at(7, 0), at(7, 30)), at(8, 0), &policy);
        assert!(matches!(past, Err(Error::Validation(_))));

        let blank = apply(
            &base,
            &Command::RequestReschedule {
                by: Party::Candidate,
                start_time: at(14, 0),
                end_time: at(15, 0),
                reason: String::new(),
            },
            at(8, 0),
            &policy,
        );
        assert!(matches!(blank, Err(Error::Validation(_))));

        expect_invalid(
            apply(
                &interview(InterviewStatus::Pending),
                &propose(Party::Candidate, at(14, 0), at(15, 0)),
                at(8, 0),
                &policy,
            ),
            InterviewStatus::Pending,
        );
    }

    #[test]
    fn ai_interviews_cannot_be_rescheduled() {
        let mut ai = interview(InterviewStatus::Scheduled);
        ai.mode = InterviewMode::Ai;
        let result = apply(
            &ai,
            &propose(Party::Candidate, at(14, 0), at(15, 0)),
            at(8, 0),
            &StartPolicy::default(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn cancel_is_terminal() {
        let policy = StartPolicy::default();
        let cancelled = apply(
            &interview(InterviewStatus::InProgress),
            &Command::Cancel { reason: Some("position filled".into()) },
            at(10, 30),
            &policy,
        )
        .unwrap();
        assert_eq!(cancelled.status, InterviewStatus::Cancelled);
        assert_eq!(cancelled.cancelled_at, Some(at(10, 30)));
        assert!(allowed_events(&cancelled, at(10, 31), &policy).is_empty());
        expect_invalid(
            apply(&cancelled, &Command::Cancel { reason: None }, at(10, 31), &policy),
            InterviewStatus::Cancelled,
        );
    }

    #[test]
    fn terminal_statuses_permit_nothing() {
        for status in InterviewStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for event in InterviewEvent::ALL {
                assert!(!permits(status, event), "{} should not permit {}", status, event.as_str());
            }
        }
    }

    #[test]
    fn allowed_events_follow_the_clock() {
        let policy = StartPolicy::default();
        let scheduled = interview(InterviewStatus::Scheduled);
        let early = allowed_events(&scheduled, at(8, 0), &policy);
        assert!(!early.contains(&InterviewEvent::Start));
        assert!(early.contains(&InterviewEvent::RequestReschedule));
        let on_time = allowed_events(&scheduled, at(9, 50), &policy);
        assert!(on_time.contains(&InterviewEvent::Start));
    }
}
