use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::interview::{
    Interview, InterviewEvent, InterviewMode, InterviewResult, InterviewStatus,
};
use crate::models::slot::{SlotAvailability, SlotQuery, SlotWindow};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct BookInterviewPayload {
    #[validate(length(min = 1))]
    pub application_id: String,
    #[validate(length(min = 1))]
    pub job_id: String,
    #[validate(length(min = 1))]
    pub candidate_name: String,
    #[validate(email)]
    pub candidate_email: String,
    pub mode: InterviewMode,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(length(min = 1))]
    pub interviewer_id: String,
    #[validate(email)]
    pub interviewer_email: Option<String>,
    pub interviewer_name: Option<String>,
    /// Repeating a booking with the same key returns the original interview.
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAiInterviewPayload {
    #[validate(length(min = 1))]
    pub application_id: String,
    #[validate(length(min = 1))]
    pub job_id: String,
    #[validate(length(min = 1))]
    pub candidate_name: String,
    #[validate(email)]
    pub candidate_email: String,
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReasonPayload {
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CompleteInterviewPayload {
    pub result: Option<InterviewResult>,
    #[validate(length(max = 5000))]
    pub comments: Option<String>,
    #[validate(length(max = 5000))]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProposeReschedulePayload {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RejectReschedulePayload {
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
}

fn default_duration() -> i64 {
    60
}

fn default_channel() -> InterviewMode {
    InterviewMode::Hr
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlotQueryParams {
    #[validate(length(min = 1))]
    pub interviewer_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default = "default_channel")]
    pub channel: InterviewMode,
}

impl From<SlotQueryParams> for SlotQuery {
    fn from(params: SlotQueryParams) -> Self {
        Self {
            interviewer_id: params.interviewer_id,
            start_date: params.start_date,
            end_date: params.end_date,
            duration_minutes: params.duration_minutes,
            mode: params.channel,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingResponse {
    pub interview_id: Uuid,
    pub meeting_link: Option<String>,
    pub status: InterviewStatus,
    pub interview: Interview,
}

impl From<Interview> for BookingResponse {
    fn from(interview: Interview) -> Self {
        Self {
            interview_id: interview.id,
            meeting_link: interview.meeting_link.clone(),
            status: interview.status,
            interview,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InterviewDetailResponse {
    #[serde(flatten)]
    pub interview: Interview,
    pub allowed_actions: Vec<InterviewEvent>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InterviewListResponse {
    pub items: Vec<Interview>,
    pub total: usize,
}

impl From<Vec<Interview>> for InterviewListResponse {
    fn from(items: Vec<Interview>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

/// `status` is `available` or `empty`; an empty result is not an error.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlotAvailabilityResponse {
    pub status: String,
    pub slots: BTreeMap<String, Vec<SlotWindow>>,
    pub total: usize,
}

impl From<SlotAvailability> for SlotAvailabilityResponse {
    fn from(availability: SlotAvailability) -> Self {
        match availability {
            SlotAvailability::Empty => Self {
                status: "empty".to_string(),
                slots: BTreeMap::new(),
                total: 0,
            },
            SlotAvailability::Available(groups) => {
                let total = groups.values().map(Vec::len).sum();
                Self {
                    status: "available".to_string(),
                    slots: groups
                        .into_iter()
                        .map(|(date, windows)| (date.to_string(), windows))
                        .collect(),
                    total,
                }
            }
        }
    }
}
