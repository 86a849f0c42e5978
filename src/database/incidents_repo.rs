use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::IncidentRow;

const INCIDENT_COLUMNS: &str = r#"
  id,
  organization_id,
  child_id,
  session_id,
  reported_by,
  severity,
  category,
  description,
  action_taken,
  occurred_at,
  guardian_notified_at,
  resolved_at,
  resolved_by,
  created_at
"#;

pub struct NewIncident<'a> {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub child_id: Uuid,
    pub session_id: Option<Uuid>,
    pub reported_by: Uuid,
    pub severity: &'a str,
    pub category: &'a str,
    pub description: &'a str,
    pub action_taken: Option<&'a str>,
    pub occurred_at: DateTime<Utc>,
}

pub async fn insert_incident(
    conn: &mut PgConnection,
    incident: NewIncident<'_>,
) -> sqlx::Result<IncidentRow> {
    let sql = format!(
        r#"
INSERT INTO incidents (
  id,
  organization_id,
  child_id,
  session_id,
  reported_by,
  severity,
  category,
  description,
  action_taken,
  occurred_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
RETURNING {INCIDENT_COLUMNS}
"#
    );
    sqlx::query_as::<_, IncidentRow>(&sql)
        .bind(incident.id)
        .bind(incident.organization_id)
        .bind(incident.child_id)
        .bind(incident.session_id)
        .bind(incident.reported_by)
        .bind(incident.severity)
        .bind(incident.category)
        .bind(incident.description)
        .bind(incident.action_taken)
        .bind(incident.occurred_at)
        .fetch_one(conn)
        .await
}

pub async fn load_incident(
    conn: &mut PgConnection,
    incident_id: Uuid,
) -> sqlx::Result<Option<IncidentRow>> {
    let sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1 LIMIT 1");
    sqlx::query_as::<_, IncidentRow>(&sql)
        .bind(incident_id)
        .fetch_optional(conn)
        .await
}

pub async fn mark_guardian_notified(
    conn: &mut PgConnection,
    incident_id: Uuid,
    at: DateTime<Utc>,
) -> sqlx::Result<Option<IncidentRow>> {
    let sql = format!(
        r#"
UPDATE incidents
SET guardian_notified_at = COALESCE(guardian_notified_at, $2)
WHERE id = $1
RETURNING {INCIDENT_COLUMNS}
"#
    );
    sqlx::query_as::<_, IncidentRow>(&sql)
        .bind(incident_id)
        .bind(at)
        .fetch_optional(conn)
        .await
}

/// Returns `None` when the incident does not exist or is already resolved.
pub async fn resolve_incident(
    conn: &mut PgConnection,
    incident_id: Uuid,
    resolved_by: Uuid,
    action_taken: Option<&str>,
    at: DateTime<Utc>,
) -> sqlx::Result<Option<IncidentRow>> {
    let sql = format!(
        r#"
UPDATE incidents
SET resolved_at = $3,
    resolved_by = $2,
    action_taken = COALESCE($4, action_taken)
WHERE id = $1
  AND resolved_at IS NULL
RETURNING {INCIDENT_COLUMNS}
"#
    );
    sqlx::query_as::<_, IncidentRow>(&sql)
        .bind(incident_id)
        .bind(resolved_by)
        .bind(at)
        .bind(action_taken)
        .fetch_optional(conn)
        .await
}

pub async fn list_open(conn: &mut PgConnection) -> sqlx::Result<Vec<IncidentRow>> {
    let sql = format!(
        r#"
SELECT {INCIDENT_COLUMNS}
FROM incidents
WHERE resolved_at IS NULL
ORDER BY
  CASE severity
    WHEN 'critical' THEN 0
    WHEN 'high' THEN 1
    WHEN 'medium' THEN 2
    ELSE 3
  END,
  occurred_at DESC
"#
    );
    sqlx::query_as::<_, IncidentRow>(&sql).fetch_all(conn).await
}

pub async fn list_for_guardian(
    conn: &mut PgConnection,
    guardian_id: Uuid,
) -> sqlx::Result<Vec<IncidentRow>> {
    let sql = format!(
        r#"
SELECT {INCIDENT_COLUMNS}
FROM incidents
WHERE child_id IN (SELECT id FROM children WHERE guardian_id = $1)
ORDER BY occurred_at DESC
"#
    );
    sqlx::query_as::<_, IncidentRow>(&sql)
        .bind(guardian_id)
        .fetch_all(conn)
        .await
}
