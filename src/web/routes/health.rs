use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::AppState;

/// Liveness plus a database ping. Reports `degraded` rather than failing when
/// the database is unreachable.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
    {
        Ok(_) => "ok",
        Err(e) => {
            warn!(error = %e, "health check database ping failed");
            "unavailable"
        }
    };
    let status = if database == "ok" { "ok" } else { "degraded" };
    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "database": database,
            "version": env!("CARGO_PKG_VERSION"),
            "build": env!("CAMPDESK_BUILD_ID"),
        })),
    )
}
