use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{RegistrationRow, RegistrationSummaryRow};

const REGISTRATION_COLUMNS: &str = r#"
  id,
  organization_id,
  child_id,
  session_id,
  status,
  form_submission_id,
  created_by,
  created_at,
  cancelled_at
"#;

pub struct NewRegistration {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub child_id: Uuid,
    pub session_id: Uuid,
    pub form_submission_id: Option<Uuid>,
    pub created_by: Uuid,
}

/// Inserts a confirmed registration, or re-activates a cancelled one for the same
/// child and session. Returns `None` when an active registration already exists.
pub async fn upsert_confirmed(
    conn: &mut PgConnection,
    reg: NewRegistration,
) -> sqlx::Result<Option<RegistrationRow>> {
    let sql = format!(
        r#"
INSERT INTO registrations (
  id,
  organization_id,
  child_id,
  session_id,
  status,
  form_submission_id,
  created_by
) VALUES ($1, $2, $3, $4, 'confirmed', $5, $6)
ON CONFLICT (child_id, session_id) DO UPDATE
SET status = 'confirmed',
    cancelled_at = NULL,
    form_submission_id = COALESCE(EXCLUDED.form_submission_id, registrations.form_submission_id),
    created_by = EXCLUDED.created_by,
    created_at = now()
WHERE registrations.status = 'cancelled'
RETURNING {REGISTRATION_COLUMNS}
"#
    );
    sqlx::query_as::<_, RegistrationRow>(&sql)
        .bind(reg.id)
        .bind(reg.organization_id)
        .bind(reg.child_id)
        .bind(reg.session_id)
        .bind(reg.form_submission_id)
        .bind(reg.created_by)
        .fetch_optional(conn)
        .await
}

pub async fn load_registration(
    conn: &mut PgConnection,
    registration_id: Uuid,
) -> sqlx::Result<Option<RegistrationRow>> {
    let sql = format!("SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1 LIMIT 1");
    sqlx::query_as::<_, RegistrationRow>(&sql)
        .bind(registration_id)
        .fetch_optional(conn)
        .await
}

pub async fn find_active(
    conn: &mut PgConnection,
    child_id: Uuid,
    session_id: Uuid,
) -> sqlx::Result<Option<RegistrationRow>> {
    let sql = format!(
        r#"
SELECT {REGISTRATION_COLUMNS}
FROM registrations
WHERE child_id = $1
  AND session_id = $2
  AND status = 'confirmed'
LIMIT 1
"#
    );
    sqlx::query_as::<_, RegistrationRow>(&sql)
        .bind(child_id)
        .bind(session_id)
        .fetch_optional(conn)
        .await
}

pub async fn cancel_registration(
    conn: &mut PgConnection,
    registration_id: Uuid,
) -> sqlx::Result<Option<RegistrationRow>> {
    let sql = format!(
        r#"
UPDATE registrations
SET status = 'cancelled',
    cancelled_at = now()
WHERE id = $1
  AND status = 'confirmed'
RETURNING {REGISTRATION_COLUMNS}
"#
    );
    sqlx::query_as::<_, RegistrationRow>(&sql)
        .bind(registration_id)
        .fetch_optional(conn)
        .await
}

const SQL_COUNT_ACTIVE: &str = r#"
SELECT COUNT(*)
FROM registrations
WHERE session_id = $1
  AND status = 'confirmed'
"#;

pub async fn count_active(conn: &mut PgConnection, session_id: Uuid) -> sqlx::Result<i64> {
    sqlx::query_scalar(SQL_COUNT_ACTIVE)
        .bind(session_id)
        .fetch_one(conn)
        .await
}

const SQL_SUMMARY_SELECT: &str = r#"
SELECT
  r.id,
  r.child_id,
  c.first_name || ' ' || c.last_name AS child_name,
  r.session_id,
  s.name AS session_name,
  s.starts_on,
  s.ends_on,
  r.status,
  r.created_at
FROM registrations r
JOIN children c ON c.id = r.child_id
JOIN camp_sessions s ON s.id = r.session_id
"#;

pub async fn list_for_guardian(
    conn: &mut PgConnection,
    guardian_id: Uuid,
) -> sqlx::Result<Vec<RegistrationSummaryRow>> {
    let sql = format!("{SQL_SUMMARY_SELECT} WHERE c.guardian_id = $1 ORDER BY s.starts_on ASC, child_name ASC");
    sqlx::query_as::<_, RegistrationSummaryRow>(&sql)
        .bind(guardian_id)
        .fetch_all(conn)
        .await
}

pub async fn list_for_session(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> sqlx::Result<Vec<RegistrationSummaryRow>> {
    let sql = format!("{SQL_SUMMARY_SELECT} WHERE r.session_id = $1 ORDER BY r.status ASC, child_name ASC");
    sqlx::query_as::<_, RegistrationSummaryRow>(&sql)
        .bind(session_id)
        .fetch_all(conn)
        .await
}
