use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ActionResult, AppError};
use crate::models::AttendanceRow;
use crate::services::attendance_service::{self, AttendanceInput, Roster};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

pub async fn roster_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
    State(state): State<AppState>,
) -> Result<ActionResult<Roster>, AppError> {
    let roster =
        attendance_service::roster(&state.pool, &auth_user.actor(), session_id, query.date).await?;
    Ok(ActionResult::ok(roster))
}

pub async fn record_attendance_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(input): Json<AttendanceInput>,
) -> Result<ActionResult<AttendanceRow>, AppError> {
    let row =
        attendance_service::record(&state.pool, &auth_user.actor(), session_id, input).await?;
    Ok(ActionResult::ok(row))
}
