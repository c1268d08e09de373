use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    database::ledger::InterviewFilter,
    dto::interview_dto::{
        BookInterviewPayload, BookingResponse, CompleteInterviewPayload, CreateAiInterviewPayload,
        InterviewDetailResponse, InterviewListResponse, ProposeReschedulePayload, ReasonPayload,
        RejectReschedulePayload,
    },
    error::Result,
    models::interview::{Interview, InterviewTransition},
    models::user::Actor,
    services::booking_service::Booking,
    services::interview_service::Action,
    utils::time,
    AppState,
};

fn booked(booking: Booking) -> impl IntoResponse {
    let status = if booking.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(BookingResponse::from(booking.interview)))
}

fn detail(state: &AppState, interview: Interview) -> InterviewDetailResponse {
    let allowed_actions = state.interview_service.allowed_actions(&interview, time::now());
    InterviewDetailResponse {
        interview,
        allowed_actions,
    }
}

async fn run(
    state: &AppState,
    id: Uuid,
    actor: &Actor,
    action: Action,
) -> Result<Json<InterviewDetailResponse>> {
    let interview = state
        .interview_service
        .perform(id, actor, action, time::now())
        .await?;
    Ok(Json(detail(state, interview)))
}

#[utoipa::path(
    post,
    path = "/api/interviews",
    request_body = BookInterviewPayload,
    responses(
        (status = 201, description = "Interview booked", body = BookingResponse),
        (status = 200, description = "Idempotent replay of an earlier booking", body = BookingResponse),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Interviewer already booked in this window")
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn book_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<BookInterviewPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let booking = state
        .booking_service
        .book(payload, &actor, time::now())
        .await?;
    Ok(booked(booking))
}

#[utoipa::path(
    post,
    path = "/api/interviews/ai",
    request_body = CreateAiInterviewPayload,
    responses(
        (status = 201, description = "AI interview created", body = BookingResponse),
        (status = 400, description = "Invalid payload")
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn create_ai_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateAiInterviewPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let booking = state
        .booking_service
        .create_ai_interview(payload, &actor, time::now())
        .await?;
    Ok(booked(booking))
}

#[utoipa::path(
    get,
    path = "/api/interviews",
    params(InterviewFilter),
    responses(
        (status = 200, description = "Interviews matching the filter", body = InterviewListResponse)
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn list_interviews(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(filter): Query<InterviewFilter>,
) -> Result<impl IntoResponse> {
    let items = state.interview_service.list(filter, &actor).await?;
    Ok(Json(InterviewListResponse::from(items)))
}

#[utoipa::path(
    get,
    path = "/api/interviews/{id}",
    params(("id" = Uuid, Path, description = "Interview ID")),
    responses(
        (status = 200, description = "Interview with the actions it currently accepts", body = InterviewDetailResponse),
        (status = 404, description = "Interview not found")
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn get_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let interview = state.interview_service.get(id, &actor).await?;
    Ok(Json(detail(&state, interview)))
}

#[utoipa::path(
    get,
    path = "/api/interviews/{id}/history",
    params(("id" = Uuid, Path, description = "Interview ID")),
    responses(
        (status = 200, description = "Applied transitions, oldest first", body = [InterviewTransition]),
        (status = 404, description = "Interview not found")
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn get_interview_history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InterviewTransition>>> {
    let history = state.interview_service.history(id, &actor).await?;
    Ok(Json(history))
}

#[utoipa::path(
    post,
    path = "/api/interviews/{id}/accept",
    params(("id" = Uuid, Path, description = "Interview ID")),
    responses(
        (status = 200, description = "Interview confirmed", body = InterviewDetailResponse),
        (status = 403, description = "Caller is not the candidate"),
        (status = 409, description = "Invalid state transition")
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn accept_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    run(&state, id, &actor, Action::Accept).await
}

#[utoipa::path(
    post,
    path = "/api/interviews/{id}/reject",
    params(("id" = Uuid, Path, description = "Interview ID")),
    request_body(content = ReasonPayload, description = "Optional reason"),
    responses(
        (status = 200, description = "Interview rejected", body = InterviewDetailResponse),
        (status = 409, description = "Invalid state transition")
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn reject_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonPayload>>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;
    run(&state, id, &actor, Action::Reject { reason: payload.reason }).await
}

#[utoipa::path(
    post,
    path = "/api/interviews/{id}/start",
    params(("id" = Uuid, Path, description = "Interview ID")),
    responses(
        (status = 200, description = "Interview in progress", body = InterviewDetailResponse),
        (status = 409, description = "Outside the start window or invalid state")
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn start_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    run(&state, id, &actor, Action::Start).await
}

#[utoipa::path(
    post,
    path = "/api/interviews/{id}/complete",
    params(("id" = Uuid, Path, description = "Interview ID")),
    request_body = CompleteInterviewPayload,
    responses(
        (status = 200, description = "Interview completed", body = InterviewDetailResponse),
        (status = 400, description = "Result missing"),
        (status = 409, description = "Invalid state transition")
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn complete_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteInterviewPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let action = Action::Complete {
        result: payload.result,
        comments: payload.comments,
        suggestion: payload.suggestion,
    };
    run(&state, id, &actor, action).await
}

#[utoipa::path(
    post,
    path = "/api/interviews/{id}/cancel",
    params(("id" = Uuid, Path, description = "Interview ID")),
    request_body(content = ReasonPayload, description = "Optional reason"),
    responses(
        (status = 200, description = "Interview cancelled", body = InterviewDetailResponse),
        (status = 403, description = "Admins only"),
        (status = 409, description = "Already terminal")
    ),
    security(("bearer" = [])),
    tag = "interviews"
)]
#[axum::debug_handler]
pub async fn cancel_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonPayload>>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;
    run(&state, id, &actor, Action::Cancel { reason: payload.reason }).await
}

#[utoipa::path(
    post,
    path = "/api/interviews/{id}/reschedule",
    params(("id" = Uuid, Path, description = "Interview ID")),
    request_body = ProposeReschedulePayload,
    responses(
        (status = 200, description = "Reschedule proposed", body = InterviewDetailResponse),
        (status = 400, description = "Invalid window or AI interview"),
        (status = 409, description = "A request is already outstanding")
    ),
    security(("bearer" = [])),
    tag = "reschedule"
)]
#[axum::debug_handler]
pub async fn propose_reschedule(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProposeReschedulePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let action = Action::ProposeReschedule {
        start_time: payload.start_time,
        end_time: payload.end_time,
        reason: payload.reason,
    };
    run(&state, id, &actor, action).await
}

#[utoipa::path(
    post,
    path = "/api/interviews/{id}/reschedule/accept",
    params(("id" = Uuid, Path, description = "Interview ID")),
    responses(
        (status = 200, description = "Interview moved to the requested window", body = InterviewDetailResponse),
        (status = 403, description = "The proposer cannot resolve their own request"),
        (status = 409, description = "Requested window no longer available")
    ),
    security(("bearer" = [])),
    tag = "reschedule"
)]
#[axum::debug_handler]
pub async fn accept_reschedule(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    run(&state, id, &actor, Action::AcceptReschedule).await
}

#[utoipa::path(
    post,
    path = "/api/interviews/{id}/reschedule/reject",
    params(("id" = Uuid, Path, description = "Interview ID")),
    request_body = RejectReschedulePayload,
    responses(
        (status = 200, description = "Request declined, original window kept", body = InterviewDetailResponse),
        (status = 400, description = "Reason missing"),
        (status = 409, description = "No outstanding request")
    ),
    security(("bearer" = [])),
    tag = "reschedule"
)]
#[axum::debug_handler]
pub async fn reject_reschedule(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectReschedulePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    run(
        &state,
        id,
        &actor,
        Action::RejectReschedule {
            reason: payload.reason,
        },
    )
    .await
}
