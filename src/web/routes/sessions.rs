use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ActionResult, AppError};
use crate::models::{CampSessionRow, RegistrationSummaryRow, WaitlistViewRow};
use crate::services::sessions_service::{self, SessionInput, SessionListing};
use crate::services::{registration_service, waitlist_service};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

pub async fn list_sessions_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<ActionResult<Vec<SessionListing>>, AppError> {
    let rows = sessions_service::list_sessions(&state.pool, &auth_user.actor()).await?;
    Ok(ActionResult::ok(rows))
}

pub async fn create_session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(input): Json<SessionInput>,
) -> Result<ActionResult<CampSessionRow>, AppError> {
    let session = sessions_service::create_session(&state.pool, &auth_user.actor(), input).await?;
    Ok(ActionResult::ok(session))
}

pub async fn session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<CampSessionRow>, AppError> {
    let session =
        sessions_service::load_session(&state.pool, &auth_user.actor(), session_id).await?;
    Ok(ActionResult::ok(session))
}

pub async fn update_session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(input): Json<SessionInput>,
) -> Result<ActionResult<CampSessionRow>, AppError> {
    let session = sessions_service::update_session(
        &state.pool,
        &auth_user.actor(),
        session_id,
        input,
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(session))
}

pub async fn open_session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<CampSessionRow>, AppError> {
    let session = sessions_service::open_session(
        &state.pool,
        &auth_user.actor(),
        session_id,
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(session))
}

pub async fn close_session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<CampSessionRow>, AppError> {
    let session = sessions_service::close_session(
        &state.pool,
        &auth_user.actor(),
        session_id,
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(session))
}

pub async fn session_registrations_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<Vec<RegistrationSummaryRow>>, AppError> {
    let rows =
        registration_service::list_for_session(&state.pool, &auth_user.actor(), session_id).await?;
    Ok(ActionResult::ok(rows))
}

pub async fn session_waitlist_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<Vec<WaitlistViewRow>>, AppError> {
    let rows = waitlist_service::list_for_session(
        &state.pool,
        &auth_user.actor(),
        session_id,
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(rows))
}
