use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::database::ledger::InterviewLedger;
use crate::dto::interview_dto::{BookInterviewPayload, CreateAiInterviewPayload};
use crate::error::{Error, Result};
use crate::models::interview::{Interview, InterviewMode, InterviewStatus, InterviewTransition};
use crate::models::user::{Actor, Role};
use crate::services::notification_service::{dispatch, Notifier};
use crate::utils::token::meeting_link;

/// Outcome of a booking call. `created` is false when an idempotency key
/// matched an earlier booking.
#[derive(Debug, Clone)]
pub struct Booking {
    pub interview: Interview,
    pub created: bool,
}

#[derive(Clone)]
pub struct BookingService {
    ledger: Arc<dyn InterviewLedger>,
    notifier: Arc<dyn Notifier>,
    meeting_base_url: String,
    confirmation_required_modes: Vec<InterviewMode>,
}

impl BookingService {
    pub fn new(
        ledger: Arc<dyn InterviewLedger>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        Self {
            ledger,
            notifier,
            meeting_base_url: config.meeting_base_url.clone(),
            confirmation_required_modes: config.confirmation_required_modes.clone(),
        }
    }

    fn initial_status(&self, mode: InterviewMode) -> InterviewStatus {
        if mode == InterviewMode::Ai || self.confirmation_required_modes.contains(&mode) {
            InterviewStatus::Pending
        } else {
            InterviewStatus::Scheduled
        }
    }

    async fn replay(&self, key: Option<&str>) -> Result<Option<Interview>> {
        match key {
            Some(key) => self.ledger.find_by_idempotency_key(key).await,
            None => Ok(None),
        }
    }

    /// Books an HR or hiring-manager interview into a free interviewer window.
    pub async fn book(
        &self,
        payload: BookInterviewPayload,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        if !actor.role.can_book() {
            return Err(Error::Forbidden(
                "Only HR, hiring managers and admins can book interviews".to_string(),
            ));
        }
        if !payload.mode.needs_slot() {
            return Err(Error::Validation(
                "AI interviews are created through the AI interview endpoint".to_string(),
            ));
        }
        if payload.start_time >= payload.end_time {
            return Err(Error::Validation(
                "start_time must be before end_time".to_string(),
            ));
        }
        if payload.start_time <= now {
            return Err(Error::Validation(
                "Interviews must be booked in the future".to_string(),
            ));
        }

        let key = payload.idempotency_key.as_deref();
        if let Some(existing) = self.replay(key).await? {
            tracing::info!(interview_id = %existing.id, "booking replayed by idempotency key");
            return Ok(Booking {
                interview: existing,
                created: false,
            });
        }

        let busy = self
            .ledger
            .busy(&payload.interviewer_id, payload.start_time, payload.end_time, None)
            .await?;
        if let Some(clash) = busy.first() {
            tracing::info!(
                interviewer_id = %payload.interviewer_id,
                clashing_interview = %clash.id,
                "booking rejected, window taken"
            );
            return Err(Error::Conflict(
                "Interviewer already has an interview in this window".to_string(),
            ));
        }

        let status = self.initial_status(payload.mode);
        let interview = Interview {
            id: Uuid::new_v4(),
            application_id: payload.application_id,
            job_id: payload.job_id,
            candidate_name: payload.candidate_name.trim().to_string(),
            candidate_email: payload.candidate_email.trim().to_ascii_lowercase(),
            mode: payload.mode,
            status,
            start_time: Some(payload.start_time),
            end_time: Some(payload.end_time),
            meeting_link: Some(meeting_link(&self.meeting_base_url)),
            interviewer_id: Some(payload.interviewer_id),
            interviewer_email: payload.interviewer_email,
            interviewer_name: payload.interviewer_name,
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
            created_at: now,
            scheduled_at: Some(now),
            confirmed_at: None,
            started_at: None,
            ended_at: None,
            cancelled_at: None,
            updated_at: now,
            version: 1,
            idempotency_key: payload.idempotency_key,
        };

        self.store(interview, actor).await
    }

    /// Creates the AI screening interview for an application. It has no window
    /// and no interviewer, and waits in `pending` for the candidate.
    pub async fn create_ai_interview(
        &self,
        payload: CreateAiInterviewPayload,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let own_application = actor.role == Role::Candidate
            && actor
                .email
                .as_deref()
                .map_or(false, |email| email.eq_ignore_ascii_case(payload.candidate_email.trim()));
        if !actor.role.can_book() && !own_application {
            return Err(Error::Forbidden(
                "Candidates can only open AI interviews for their own applications".to_string(),
            ));
        }

        if let Some(existing) = self.replay(payload.idempotency_key.as_deref()).await? {
            return Ok(Booking {
                interview: existing,
                created: false,
            });
        }

        let interview = Interview {
            id: Uuid::new_v4(),
            application_id: payload.application_id,
            job_id: payload.job_id,
            candidate_name: payload.candidate_name.trim().to_string(),
            candidate_email: payload.candidate_email.trim().to_ascii_lowercase(),
            mode: InterviewMode::Ai,
            status: self.initial_status(InterviewMode::Ai),
            start_time: None,
            end_time: None,
            meeting_link: None,
            interviewer_id: None,
            interviewer_email: None,
            interviewer_name: None,
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
            created_at: now,
            scheduled_at: None,
            confirmed_at: None,
            started_at: None,
            ended_at: None,
            cancelled_at: None,
            updated_at: now,
            version: 1,
            idempotency_key: payload.idempotency_key,
        };

        self.store(interview, actor).await
    }

    async fn store(&self, interview: Interview, actor: &Actor) -> Result<Booking> {
        let transition = InterviewTransition::record(
            &interview,
            None,
            "book",
            Some(actor.user_id.clone()),
            Some(actor.role.to_string()),
            None,
        );

        let saved = match self.ledger.insert(&interview, &transition).await {
            Ok(saved) => saved,
            Err(Error::Conflict(msg)) => {
                // A concurrent request with the same key may have won the insert.
                if let Some(existing) = self.replay(interview.idempotency_key.as_deref()).await? {
                    return Ok(Booking {
                        interview: existing,
                        created: false,
                    });
                }
                return Err(Error::Conflict(msg));
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            interview_id = %saved.id,
            mode = %saved.mode,
            status = %saved.status,
            interviewer_id = saved.interviewer_id.as_deref().unwrap_or("-"),
            "interview booked"
        );
        dispatch(self.notifier.as_ref(), &saved).await;

        Ok(Booking {
            interview: saved,
            created: true,
        })
    }
}
