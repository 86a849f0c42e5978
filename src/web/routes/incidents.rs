use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ActionResult, AppError};
use crate::models::IncidentRow;
use crate::services::incident_service::{self, IncidentInput, ResolveInput};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

pub async fn list_incidents_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<ActionResult<Vec<IncidentRow>>, AppError> {
    let rows = incident_service::list_incidents(&state.pool, &auth_user.actor()).await?;
    Ok(ActionResult::ok(rows))
}

pub async fn report_incident_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(input): Json<IncidentInput>,
) -> Result<ActionResult<IncidentRow>, AppError> {
    let incident = incident_service::report(&state.pool, &auth_user.actor(), input).await?;
    Ok(ActionResult::ok(incident))
}

pub async fn guardian_notified_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(incident_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<IncidentRow>, AppError> {
    let incident =
        incident_service::mark_guardian_notified(&state.pool, &auth_user.actor(), incident_id)
            .await?;
    Ok(ActionResult::ok(incident))
}

pub async fn resolve_incident_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(incident_id): Path<Uuid>,
    State(state): State<AppState>,
    body: Option<Json<ResolveInput>>,
) -> Result<ActionResult<IncidentRow>, AppError> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let incident =
        incident_service::resolve(&state.pool, &auth_user.actor(), incident_id, input).await?;
    Ok(ActionResult::ok(incident))
}
