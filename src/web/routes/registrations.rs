use axum::{
    extract::{Path, State},
    Extension, Json,
};
use tracing::warn;
use uuid::Uuid;

use crate::error::{ActionResult, AppError};
use crate::models::{RegistrationRow, RegistrationSummaryRow};
use crate::services::registration_service::{self, RegisterInput, RegistrationOutcome};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

pub async fn list_registrations_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<ActionResult<Vec<RegistrationSummaryRow>>, AppError> {
    let rows = registration_service::list_for_guardian(&state.pool, &auth_user.actor()).await?;
    Ok(ActionResult::ok(rows))
}

pub async fn register_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<ActionResult<RegistrationOutcome>, AppError> {
    let session_id = input.session_id;
    let outcome = registration_service::register(
        &state.pool,
        &auth_user.actor(),
        input,
        state.offer_window(),
    )
    .await
    .map_err(|e| {
        warn!(user_id = %auth_user.id, %session_id, error = %e, "registration failed");
        e
    })?;
    Ok(ActionResult::ok(outcome))
}

pub async fn cancel_registration_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(registration_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<RegistrationRow>, AppError> {
    let registration = registration_service::cancel(
        &state.pool,
        &auth_user.actor(),
        registration_id,
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(registration))
}
