pub mod health;
pub mod interviews;
pub mod slots;

use axum::{
    middleware::from_fn_with_state,
    response::Json,
    routing::{get, post},
    Router,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::dto::interview_dto::{
    BookInterviewPayload, BookingResponse, CompleteInterviewPayload, CreateAiInterviewPayload,
    InterviewDetailResponse, InterviewListResponse, ProposeReschedulePayload, ReasonPayload,
    RejectReschedulePayload, SlotAvailabilityResponse,
};
use crate::middleware::auth::require_bearer_auth;
use crate::middleware::rate_limit::{rps_middleware, RateLimiter};
use crate::models::interview::{
    Interview, InterviewEvent, InterviewMode, InterviewResult, InterviewStatus,
    InterviewTransition, Party,
};
use crate::models::slot::SlotWindow;
use crate::AppState;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        interviews::book_interview,
        interviews::create_ai_interview,
        interviews::list_interviews,
        interviews::get_interview,
        interviews::get_interview_history,
        interviews::accept_interview,
        interviews::reject_interview,
        interviews::start_interview,
        interviews::complete_interview,
        interviews::cancel_interview,
        interviews::propose_reschedule,
        interviews::accept_reschedule,
        interviews::reject_reschedule,
        slots::get_slots,
    ),
    components(schemas(
        Interview,
        InterviewStatus,
        InterviewMode,
        InterviewEvent,
        InterviewResult,
        InterviewTransition,
        Party,
        SlotWindow,
        BookInterviewPayload,
        CreateAiInterviewPayload,
        ReasonPayload,
        CompleteInterviewPayload,
        ProposeReschedulePayload,
        RejectReschedulePayload,
        BookingResponse,
        InterviewDetailResponse,
        InterviewListResponse,
        SlotAvailabilityResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "interviews", description = "Booking and interview lifecycle"),
        (name = "reschedule", description = "Reschedule negotiation"),
        (name = "slots", description = "Interviewer availability")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Every route, with authentication and the per-router RPS limit applied.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/interviews",
            get(interviews::list_interviews).post(interviews::book_interview),
        )
        .route("/api/interviews/ai", post(interviews::create_ai_interview))
        .route("/api/interviews/:id", get(interviews::get_interview))
        .route(
            "/api/interviews/:id/history",
            get(interviews::get_interview_history),
        )
        .route("/api/interviews/:id/accept", post(interviews::accept_interview))
        .route("/api/interviews/:id/reject", post(interviews::reject_interview))
        .route("/api/interviews/:id/start", post(interviews::start_interview))
        .route(
            "/api/interviews/:id/complete",
            post(interviews::complete_interview),
        )
        .route("/api/interviews/:id/cancel", post(interviews::cancel_interview))
        .route(
            "/api/interviews/:id/reschedule",
            post(interviews::propose_reschedule),
        )
        .route(
            "/api/interviews/:id/reschedule/accept",
            post(interviews::accept_reschedule),
        )
        .route(
            "/api/interviews/:id/reschedule/reject",
            post(interviews::reject_reschedule),
        )
        .route("/api/slots", get(slots::get_slots))
        .route_layer(from_fn_with_state(state.clone(), require_bearer_auth))
        .layer(from_fn_with_state(
            RateLimiter::new(state.config.api_rps),
            rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/openapi.json", get(openapi_json))
        .merge(api)
        .with_state(state)
}
