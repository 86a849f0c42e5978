use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::events_repo::{self, NewEvent};
use crate::database::tenant_context::with_organization_context;
use crate::error::AppError;
use crate::models::EventRow;
use crate::permissions::{Actor, Permission};

const MAX_RECENT: i64 = 200;

/// Appends an audit event on the caller's transaction.
pub async fn record(
    conn: &mut PgConnection,
    actor: &Actor,
    kind: &str,
    subject_type: &str,
    subject_id: Uuid,
    payload: Value,
) -> Result<(), AppError> {
    events_repo::insert_event(
        conn,
        NewEvent {
            organization_id: actor.organization_id,
            actor_id: Some(actor.user_id),
            kind,
            subject_type,
            subject_id,
            payload,
        },
    )
    .await?;
    Ok(())
}

/// Same as `record` for changes the system makes on its own, such as an
/// expired offer.
pub async fn record_system(
    conn: &mut PgConnection,
    organization_id: Uuid,
    kind: &str,
    subject_type: &str,
    subject_id: Uuid,
    payload: Value,
) -> Result<(), AppError> {
    events_repo::insert_event(
        conn,
        NewEvent {
            organization_id,
            actor_id: None,
            kind,
            subject_type,
            subject_id,
            payload,
        },
    )
    .await?;
    Ok(())
}

pub async fn list_recent(
    pool: &PgPool,
    actor: &Actor,
    limit: Option<i64>,
) -> Result<Vec<EventRow>, AppError> {
    actor.require(Permission::EventsRead)?;
    let limit = limit.unwrap_or(50).clamp(1, MAX_RECENT);
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move { Ok(events_repo::list_recent(conn, limit).await?) })
    })
    .await
}
