use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ActionResult, AppError};
use crate::services::billing_service::{self, AdjustmentInput, PaymentInput, Statement};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct StatementQuery {
    pub guardian_id: Option<Uuid>,
}

pub async fn statement_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<StatementQuery>,
    State(state): State<AppState>,
) -> Result<ActionResult<Statement>, AppError> {
    let statement =
        billing_service::statement(&state.pool, &auth_user.actor(), query.guardian_id).await?;
    Ok(ActionResult::ok(statement))
}

pub async fn record_payment_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(input): Json<PaymentInput>,
) -> Result<ActionResult<Statement>, AppError> {
    let statement = billing_service::record_payment(&state.pool, &auth_user.actor(), input).await?;
    Ok(ActionResult::ok(statement))
}

pub async fn record_adjustment_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(input): Json<AdjustmentInput>,
) -> Result<ActionResult<Statement>, AppError> {
    let statement =
        billing_service::record_adjustment(&state.pool, &auth_user.actor(), input).await?;
    Ok(ActionResult::ok(statement))
}
