use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::ledger::{InterviewFilter, InterviewLedger};
use crate::error::{Error, Result};
use crate::models::interview::{
    Interview, InterviewEvent, InterviewMode, InterviewResult, InterviewTransition, Party,
};
use crate::models::user::{Actor, Role};
use crate::services::notification_service::{dispatch, Notifier};
use crate::services::state_machine::{self, Command, StartPolicy};

/// A lifecycle request as it arrives from a caller. The negotiating party is
/// worked out from the caller's identity.
#[derive(Debug, Clone)]
pub enum Action {
    Accept,
    Reject {
        reason: Option<String>,
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
    ProposeReschedule {
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        reason: String,
    },
    AcceptReschedule,
    RejectReschedule {
        reason: String,
    },
}

impl Action {
    pub fn event(&self) -> InterviewEvent {
        match self {
            Action::Accept => InterviewEvent::Accept,
            Action::Reject { .. } => InterviewEvent::Reject,
            Action::Start => InterviewEvent::Start,
            Action::Complete { .. } => InterviewEvent::Complete,
            Action::Cancel { .. } => InterviewEvent::Cancel,
            Action::ProposeReschedule { .. } => InterviewEvent::RequestReschedule,
            Action::AcceptReschedule => InterviewEvent::AcceptReschedule,
            Action::RejectReschedule { .. } => InterviewEvent::RejectReschedule,
        }
    }

    fn into_command(self, party: Party) -> Command {
        match self {
            Action::Accept => Command::Accept,
            Action::Reject { reason } => Command::Reject { reason },
            Action::Start => Command::Start,
            Action::Complete {
                result,
                comments,
                suggestion,
            } => Command::Complete {
                result,
                comments,
                suggestion,
            },
            Action::Cancel { reason } => Command::Cancel { reason },
            Action::ProposeReschedule {
                start_time,
                end_time,
                reason,
            } => Command::RequestReschedule {
                by: party,
                start_time,
                end_time,
                reason,
            },
            Action::AcceptReschedule => Command::AcceptReschedule { by: party },
            Action::RejectReschedule { reason } => Command::RejectReschedule { by: party, reason },
        }
    }
}

fn is_candidate(interview: &Interview, actor: &Actor) -> bool {
    actor.role == Role::Candidate
        && actor
            .email
            .as_deref()
            .map_or(false, |email| interview.is_candidate(email))
}

fn is_interviewer(interview: &Interview, actor: &Actor) -> bool {
    actor.role != Role::Candidate && interview.is_interviewer(&actor.user_id)
}

fn forbidden(actor: &Actor, event: InterviewEvent) -> Error {
    Error::Forbidden(format!(
        "{} {} is not allowed to {} this interview",
        actor.role, actor.user_id, event
    ))
}

/// Decides which side of the interview `actor` acts for, or refuses.
pub fn authorize(interview: &Interview, actor: &Actor, event: InterviewEvent) -> Result<Party> {
    let candidate = is_candidate(interview, actor);
    let interviewer = is_interviewer(interview, actor) || actor.role.is_admin();
    let ai = interview.mode == InterviewMode::Ai;

    let party = match event {
        InterviewEvent::Accept | InterviewEvent::Reject => candidate.then_some(Party::Candidate),
        InterviewEvent::Start if ai => {
            (candidate || actor.role.is_admin()).then_some(Party::Candidate)
        }
        InterviewEvent::Complete if ai => actor.role.is_admin().then_some(Party::Interviewer),
        InterviewEvent::Start | InterviewEvent::Complete => {
            interviewer.then_some(Party::Interviewer)
        }
        InterviewEvent::Cancel => actor.role.is_admin().then_some(Party::Interviewer),
        InterviewEvent::RequestReschedule
        | InterviewEvent::AcceptReschedule
        | InterviewEvent::RejectReschedule => {
            if candidate {
                Some(Party::Candidate)
            } else if interviewer {
                Some(Party::Interviewer)
            } else {
                None
            }
        }
    };
    party.ok_or_else(|| forbidden(actor, event))
}

/// Whether `actor` may read the record at all.
pub fn can_view(interview: &Interview, actor: &Actor) -> bool {
    match actor.role {
        Role::Candidate => is_candidate(interview, actor),
        _ => true,
    }
}

#[derive(Clone)]
pub struct InterviewService {
    ledger: Arc<dyn InterviewLedger>,
    notifier: Arc<dyn Notifier>,
    policy: StartPolicy,
}

impl InterviewService {
    pub fn new(
        ledger: Arc<dyn InterviewLedger>,
        notifier: Arc<dyn Notifier>,
        policy: StartPolicy,
    ) -> Self {
        Self {
            ledger,
            notifier,
            policy,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Interview> {
        self.ledger
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Interview {} not found", id)))
    }

    pub async fn get(&self, id: Uuid, actor: &Actor) -> Result<Interview> {
        let interview = self.load(id).await?;
        if !can_view(&interview, actor) {
            // Candidates never learn whether someone else's interview exists.
            return Err(Error::NotFound(format!("Interview {} not found", id)));
        }
        Ok(interview)
    }

    pub fn allowed_actions(
        &self,
        interview: &Interview,
        now: DateTime<Utc>,
    ) -> Vec<InterviewEvent> {
        state_machine::allowed_events(interview, now, &self.policy)
    }

    pub async fn list(&self, mut filter: InterviewFilter, actor: &Actor) -> Result<Vec<Interview>> {
        if actor.role == Role::Candidate {
            let email = actor.email.clone().ok_or_else(|| {
                Error::Forbidden("Candidate token carries no email".to_string())
            })?;
            filter.candidate_email = Some(email);
        }
        self.ledger.list(&filter).await
    }

    pub async fn history(&self, id: Uuid, actor: &Actor) -> Result<Vec<InterviewTransition>> {
        let interview = self.get(id, actor).await?;
        self.ledger.history(interview.id).await
    }

    /// Runs one lifecycle action against the stored record.
    pub async fn perform(
        &self,
        id: Uuid,
        actor: &Actor,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<Interview> {
        let current = self.get(id, actor).await?;
        let event = action.event();
        let party = authorize(&current, actor, event)?;
        let command = action.into_command(party);

        let next = state_machine::apply(&current, &command, now, &self.policy)?;

        match event {
            InterviewEvent::RequestReschedule => {
                self.ensure_requested_window_free(&next).await?
            }
            InterviewEvent::AcceptReschedule => {
                self.ensure_requested_window_free(&current).await?
            }
            _ => {}
        }

        let transition = InterviewTransition::record(
            &next,
            Some(current.status),
            event.as_str(),
            Some(actor.user_id.clone()),
            Some(actor.role.to_string()),
            command.reason().map(str::to_string),
        );

        let written = match self
            .ledger
            .update_if(&next, current.status, current.version, &transition)
            .await
        {
            Ok(written) => written,
            Err(Error::Conflict(_)) if event == InterviewEvent::AcceptReschedule => {
                return Err(Error::SlotNoLongerAvailable)
            }
            Err(e) => return Err(e),
        };

        let Some(saved) = written else {
            return Err(self.lost_race(id, &command, now).await);
        };

        tracing::info!(
            interview_id = %saved.id,
            from = %current.status,
            to = %saved.status,
            event = event.as_str(),
            actor_id = %actor.user_id,
            actor_role = %actor.role,
            version = saved.version,
            "interview transition"
        );
        dispatch(self.notifier.as_ref(), &saved).await;

        Ok(saved)
    }

    async fn ensure_requested_window_free(&self, interview: &Interview) -> Result<()> {
        let (Some(interviewer_id), Some((start, end))) =
            (interview.interviewer_id.as_deref(), interview.requested_window())
        else {
            return Ok(());
        };
        let busy = self
            .ledger
            .busy(interviewer_id, start, end, Some(interview.id))
            .await?;
        if !busy.is_empty() {
            tracing::info!(
                interview_id = %interview.id,
                clashing = busy.len(),
                "requested reschedule window is already booked"
            );
            return Err(Error::SlotNoLongerAvailable);
        }
        Ok(())
    }

    /// Someone else changed the record between our read and write. Replays the
    /// command on the fresh record so the caller sees the error that state implies.
    async fn lost_race(&self, id: Uuid, command: &Command, now: DateTime<Utc>) -> Error {
        let fresh = match self.load(id).await {
            Ok(fresh) => fresh,
            Err(e) => return e,
        };
        tracing::debug!(interview_id = %id, status = %fresh.status, "conditional write lost");
        match state_machine::apply(&fresh, command, now, &self.policy) {
            Err(e) => e,
            Ok(_) => Error::Conflict(
                "Interview was modified concurrently, please retry".to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_ledger::MemoryInterviewLedger;
    use crate::models::interview::InterviewStatus;
    use crate::services::notification_service::{LogNotifier, MockNotifier};
    use crate::services::state_machine::tests::{at, interview};

    fn candidate() -> Actor {
        Actor::new("cand-1", Some("ada@example.com".into()), Role::Candidate)
    }

    fn interviewer() -> Actor {
        Actor::new("hr-1", Some("hr@example.com".into()), Role::Hr)
    }

    fn admin() -> Actor {
        Actor::new("admin-1", None, Role::Admin)
    }

    async fn seeded(records: &[Interview]) -> (Arc<MemoryInterviewLedger>, InterviewService) {
        let ledger = Arc::new(MemoryInterviewLedger::new());
        for record in records {
            let t = InterviewTransition::record(record, None, "book", None, None, None);
            ledger.insert(record, &t).await.unwrap();
        }
        let svc =
            InterviewService::new(ledger.clone(), Arc::new(LogNotifier), StartPolicy::default());
        (ledger, svc)
    }

    #[tokio::test]
    async fn propose_then_accept_rebooks() {
        let booked = interview(InterviewStatus::Scheduled);
        let (ledger, svc) = seeded(&[booked.clone()]).await;

        let proposed = svc
            .perform(
                booked.id,
                &candidate(),
                Action::ProposeReschedule {
                    start_time: at(14, 0),
                    end_time: at(15, 0),
                    reason: "conflict".into(),
                },
                at(8, 0),
            )
            .await
            .unwrap();
        assert_eq!(proposed.status, InterviewStatus::Rescheduled);
        assert_eq!(proposed.reschedule_requested_by, Some(Party::Candidate));

        let accepted = svc
            .perform(booked.id, &interviewer(), Action::AcceptReschedule, at(8, 5))
            .await
            .unwrap();
        assert_eq!(accepted.status, InterviewStatus::Scheduled);
        assert_eq!(accepted.start_time, Some(at(14, 0)));
        assert_eq!(accepted.reschedule_count, 1);
        assert_eq!(accepted.version, 3);

        let history = ledger.history(booked.id).await.unwrap();
        let events: Vec<_> = history.iter().map(|t| t.event.as_str()).collect();
        assert_eq!(events, vec!["book", "request_reschedule", "accept_reschedule"]);
        assert_eq!(history[1].reason.as_deref(), Some("conflict"));
        assert_eq!(history[2].actor_role.as_deref(), Some("hr"));
    }

    #[tokio::test]
    async fn accept_fails_when_requested_window_was_taken() {
        let booked = interview(InterviewStatus::Scheduled);
        let (ledger, svc) = seeded(&[booked.clone()]).await;
        svc.perform(
            booked.id,
            &candidate(),
            Action::ProposeReschedule {
                start_time: at(14, 0),
                end_time: at(15, 0),
                reason: "conflict".into(),
            },
            at(8, 0),
        )
        .await
        .unwrap();

        let mut other = interview(InterviewStatus::Scheduled);
        other.start_time = Some(at(14, 30));
        other.end_time = Some(at(15, 30));
        other.candidate_email = "bob@example.com".into();
        ledger
            .insert(&other, &InterviewTransition::record(&other, None, "book", None, None, None))
            .await
            .unwrap();

        let err = svc
            .perform(booked.id, &interviewer(), Action::AcceptReschedule, at(8, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SlotNoLongerAvailable));
        let still = ledger.get(booked.id).await.unwrap().unwrap();
        assert_eq!(still.status, InterviewStatus::Rescheduled);
        assert_eq!(still.requested_time, Some(at(14, 0)));
    }

    #[tokio::test]
    async fn proposal_into_booked_window_is_refused() {
        let booked = interview(InterviewStatus::Scheduled);
        let mut other = interview(InterviewStatus::Scheduled);
        other.start_time = Some(at(14, 0));
        other.end_time = Some(at(15, 0));
        other.candidate_email = "bob@example.com".into();
        let (ledger, svc) = seeded(&[booked.clone(), other]).await;

        let err = svc
            .perform(
                booked.id,
                &candidate(),
                Action::ProposeReschedule {
                    start_time: at(14, 0),
                    end_time: at(15, 0),
                    reason: "conflict".into(),
                },
                at(8, 0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SlotNoLongerAvailable));
        let still = ledger.get(booked.id).await.unwrap().unwrap();
        assert_eq!(still.status, InterviewStatus::Scheduled);
        assert_eq!(still.requested_time, None);
        assert_eq!(still.version, booked.version);
    }

    #[tokio::test]
    async fn notification_failure_does_not_roll_back() {
        let booked = interview(InterviewStatus::Pending);
        let ledger = Arc::new(MemoryInterviewLedger::new());
        ledger
            .insert(&booked, &InterviewTransition::record(&booked, None, "book", None, None, None))
            .await
            .unwrap();
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .times(2)
            .returning(|_| Err(Error::UpstreamUnavailable("gateway down".into())));
        let svc = InterviewService::new(ledger.clone(), Arc::new(notifier), StartPolicy::default());

        let confirmed = svc
            .perform(booked.id, &candidate(), Action::Accept, at(8, 30))
            .await
            .unwrap();
        assert_eq!(confirmed.status, InterviewStatus::Confirmed);
        let stored = ledger.get(booked.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InterviewStatus::Confirmed);
    }

    #[tokio::test]
    async fn notifications_carry_version_in_dedupe_key() {
        let booked = interview(InterviewStatus::Pending);
        let id = booked.id;
        let ledger = Arc::new(MemoryInterviewLedger::new());
        ledger
            .insert(&booked, &InterviewTransition::record(&booked, None, "book", None, None, None))
            .await
            .unwrap();
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(move |n| n.dedupe_key.starts_with(&format!("{}:2:", id)))
            .times(2)
            .returning(|_| Ok(()));
        let svc = InterviewService::new(ledger, Arc::new(notifier), StartPolicy::default());
        svc.perform(id, &candidate(), Action::Accept, at(8, 30))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn only_the_candidate_accepts() {
        let booked = interview(InterviewStatus::Scheduled);
        let (_, svc) = seeded(&[booked.clone()]).await;
        let err = svc
            .perform(booked.id, &interviewer(), Action::Accept, at(8, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let stranger = Actor::new("cand-2", Some("eve@example.com".into()), Role::Candidate);
        let err = svc
            .perform(booked.id, &stranger, Action::Accept, at(8, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn cancel_requires_admin() {
        let booked = interview(InterviewStatus::Confirmed);
        let (_, svc) = seeded(&[booked.clone()]).await;
        let err = svc
            .perform(booked.id, &interviewer(), Action::Cancel { reason: None }, at(8, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let cancelled = svc
            .perform(
                booked.id,
                &admin(),
                Action::Cancel {
                    reason: Some("role closed".into()),
                },
                at(8, 0),
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, InterviewStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("role closed"));
    }

    #[tokio::test]
    async fn completing_pending_reports_allowed_events() {
        let booked = interview(InterviewStatus::Pending);
        let (_, svc) = seeded(&[booked.clone()]).await;
        let err = svc
            .perform(
                booked.id,
                &interviewer(),
                Action::Complete {
                    result: Some(InterviewResult::Passed),
                    comments: None,
                    suggestion: None,
                },
                at(10, 0),
            )
            .await
            .unwrap_err();
        match err {
            Error::InvalidStateTransition { current, allowed, .. } => {
                assert_eq!(current, InterviewStatus::Pending);
                assert!(allowed.contains(&InterviewEvent::Accept));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn ai_interview_started_by_candidate_completed_by_admin() {
        let mut ai = interview(InterviewStatus::Pending);
        ai.mode = InterviewMode::Ai;
        ai.start_time = None;
        ai.end_time = None;
        ai.interviewer_id = None;
        ai.interviewer_email = None;
        let (_, svc) = seeded(&[ai.clone()]).await;

        svc.perform(ai.id, &candidate(), Action::Accept, at(8, 0))
            .await
            .unwrap();
        let started = svc
            .perform(ai.id, &candidate(), Action::Start, at(22, 0))
            .await
            .unwrap();
        assert_eq!(started.status, InterviewStatus::InProgress);

        let complete = || Action::Complete {
            result: Some(InterviewResult::Passed),
            comments: None,
            suggestion: None,
        };
        assert!(matches!(
            svc.perform(ai.id, &candidate(), complete(), at(22, 30)).await,
            Err(Error::Forbidden(_))
        ));
        let done = svc
            .perform(ai.id, &admin(), complete(), at(22, 30))
            .await
            .unwrap();
        assert_eq!(done.status, InterviewStatus::Completed);
    }

    #[tokio::test]
    async fn candidate_listing_is_scoped_to_own_email() {
        let mine = interview(InterviewStatus::Scheduled);
        let mut theirs = interview(InterviewStatus::Scheduled);
        theirs.candidate_email = "bob@example.com".into();
        theirs.interviewer_id = Some("hr-2".into());
        let (_, svc) = seeded(&[mine.clone(), theirs]).await;

        let listed = svc
            .list(InterviewFilter::default(), &candidate())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        let all = svc.list(InterviewFilter::default(), &admin()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn interviewer_and_admin_negotiate_for_the_interviewer() {
        let booked = interview(InterviewStatus::Scheduled);
        assert_eq!(
            authorize(&booked, &interviewer(), InterviewEvent::RequestReschedule).unwrap(),
            Party::Interviewer
        );
        assert_eq!(
            authorize(&booked, &admin(), InterviewEvent::RejectReschedule).unwrap(),
            Party::Interviewer
        );
        assert_eq!(
            authorize(&booked, &candidate(), InterviewEvent::RequestReschedule).unwrap(),
            Party::Candidate
        );
        let other_hr = Actor::new("hr-9", None, Role::Hr);
        assert!(authorize(&booked, &other_hr, InterviewEvent::Start).is_err());
    }
}
