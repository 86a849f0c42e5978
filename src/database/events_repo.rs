use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::EventRow;

const SQL_INSERT_EVENT: &str = r#"
INSERT INTO events (
  id,
  organization_id,
  actor_id,
  kind,
  subject_type,
  subject_id,
  payload
) VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

pub struct NewEvent<'a> {
    pub organization_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: &'a str,
    pub subject_type: &'a str,
    pub subject_id: Uuid,
    pub payload: serde_json::Value,
}

pub async fn insert_event(conn: &mut PgConnection, event: NewEvent<'_>) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_INSERT_EVENT)
        .bind(Uuid::new_v4())
        .bind(event.organization_id)
        .bind(event.actor_id)
        .bind(event.kind)
        .bind(event.subject_type)
        .bind(event.subject_id)
        .bind(Json(event.payload))
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

const SQL_LIST_RECENT: &str = r#"
SELECT
  id,
  organization_id,
  actor_id,
  kind,
  subject_type,
  subject_id,
  payload,
  created_at
FROM events
ORDER BY created_at DESC
LIMIT $1
"#;

pub async fn list_recent(conn: &mut PgConnection, limit: i64) -> sqlx::Result<Vec<EventRow>> {
    sqlx::query_as::<_, EventRow>(SQL_LIST_RECENT)
        .bind(limit)
        .fetch_all(conn)
        .await
}
