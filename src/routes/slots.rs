use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
    Extension,
};
use validator::Validate;

use crate::{
    dto::interview_dto::{SlotAvailabilityResponse, SlotQueryParams},
    error::{Error, Result},
    models::slot::SlotQuery,
    models::user::{Actor, Role},
    utils::time,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/slots",
    params(SlotQueryParams),
    responses(
        (status = 200, description = "Free windows grouped by date, or an explicit empty result", body = SlotAvailabilityResponse),
        (status = 400, description = "Invalid range or duration"),
        (status = 503, description = "Calendar provider unavailable")
    ),
    security(("bearer" = [])),
    tag = "slots"
)]
#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<SlotQueryParams>,
) -> Result<impl IntoResponse> {
    params.validate()?;
    if actor.role == Role::Candidate {
        return Err(Error::Forbidden(
            "Candidates cannot browse interviewer calendars".to_string(),
        ));
    }
    let query = SlotQuery::from(params);
    let availability = state.slot_service.find_slots(&query, time::now()).await?;
    Ok(Json(SlotAvailabilityResponse::from(availability)))
}
