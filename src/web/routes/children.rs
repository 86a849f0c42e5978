use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ActionResult, AppError};
use crate::models::ChildRow;
use crate::services::children_service::{self, ChildInput};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

pub async fn list_children_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<ActionResult<Vec<ChildRow>>, AppError> {
    let rows = children_service::list_children(&state.pool, &auth_user.actor()).await?;
    Ok(ActionResult::ok(rows))
}

pub async fn create_child_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(input): Json<ChildInput>,
) -> Result<ActionResult<ChildRow>, AppError> {
    let child = children_service::create_child(&state.pool, &auth_user.actor(), input).await?;
    Ok(ActionResult::ok(child))
}

pub async fn child_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(child_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<ChildRow>, AppError> {
    let child = children_service::load_child(&state.pool, &auth_user.actor(), child_id).await?;
    Ok(ActionResult::ok(child))
}

pub async fn update_child_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(child_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(input): Json<ChildInput>,
) -> Result<ActionResult<ChildRow>, AppError> {
    let child =
        children_service::update_child(&state.pool, &auth_user.actor(), child_id, input).await?;
    Ok(ActionResult::ok(child))
}
