use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;

use crate::error::{ActionResult, AppError};
use crate::models::EventRow;
use crate::services::events_service;
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct EventsQuery {
    pub limit: Option<i64>,
}

pub async fn recent_events_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Result<ActionResult<Vec<EventRow>>, AppError> {
    let rows = events_service::list_recent(&state.pool, &auth_user.actor(), query.limit).await?;
    Ok(ActionResult::ok(rows))
}
