use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ActionResult, AppError};
use crate::models::{RegistrationRow, WaitlistEntryRow, WaitlistViewRow};
use crate::services::waitlist_service::{self, PromotionReport};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MoveEntryBody {
    pub rank: usize,
}

pub async fn accept_offer_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(entry_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<RegistrationRow>, AppError> {
    let registration = waitlist_service::accept_offer(
        &state.pool,
        &auth_user.actor(),
        entry_id,
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(registration))
}

pub async fn decline_offer_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(entry_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<WaitlistEntryRow>, AppError> {
    let entry = waitlist_service::decline_offer(
        &state.pool,
        &auth_user.actor(),
        entry_id,
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(entry))
}

pub async fn remove_entry_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(entry_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<WaitlistEntryRow>, AppError> {
    let entry = waitlist_service::remove_entry(
        &state.pool,
        &auth_user.actor(),
        entry_id,
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(entry))
}

pub async fn move_entry_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(entry_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<MoveEntryBody>,
) -> Result<ActionResult<Vec<WaitlistViewRow>>, AppError> {
    if body.rank == 0 {
        return Err(AppError::BadRequest("rank starts at 1".into()));
    }
    let view =
        waitlist_service::move_entry(&state.pool, &auth_user.actor(), entry_id, body.rank).await?;
    Ok(ActionResult::ok(view))
}

pub async fn sweep_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<ActionResult<PromotionReport>, AppError> {
    let report =
        waitlist_service::sweep(&state.pool, &auth_user.actor(), state.offer_window()).await?;
    Ok(ActionResult::ok(report))
}
