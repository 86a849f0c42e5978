use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{CampSessionRow, SessionOccupancyRow};

const SESSION_COLUMNS: &str = r#"
  id,
  organization_id,
  name,
  description,
  starts_on,
  ends_on,
  price_cents,
  capacity,
  min_age,
  max_age,
  registration_form_id,
  status,
  created_at,
  updated_at
"#;

pub struct SessionFields<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub price_cents: i64,
    pub capacity: i32,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub registration_form_id: Option<Uuid>,
}

pub async fn insert_session(
    conn: &mut PgConnection,
    id: Uuid,
    organization_id: Uuid,
    fields: SessionFields<'_>,
) -> sqlx::Result<CampSessionRow> {
    let sql = format!(
        r#"
INSERT INTO camp_sessions (
  id,
  organization_id,
  name,
  description,
  starts_on,
  ends_on,
  price_cents,
  capacity,
  min_age,
  max_age,
  registration_form_id
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
RETURNING {SESSION_COLUMNS}
"#
    );
    sqlx::query_as::<_, CampSessionRow>(&sql)
        .bind(id)
        .bind(organization_id)
        .bind(fields.name)
        .bind(fields.description)
        .bind(fields.starts_on)
        .bind(fields.ends_on)
        .bind(fields.price_cents)
        .bind(fields.capacity)
        .bind(fields.min_age)
        .bind(fields.max_age)
        .bind(fields.registration_form_id)
        .fetch_one(conn)
        .await
}

pub async fn update_session(
    conn: &mut PgConnection,
    session_id: Uuid,
    fields: SessionFields<'_>,
) -> sqlx::Result<Option<CampSessionRow>> {
    let sql = format!(
        r#"
UPDATE camp_sessions
SET name = $2,
    description = $3,
    starts_on = $4,
    ends_on = $5,
    price_cents = $6,
    capacity = $7,
    min_age = $8,
    max_age = $9,
    registration_form_id = $10,
    updated_at = now()
WHERE id = $1
RETURNING {SESSION_COLUMNS}
"#
    );
    sqlx::query_as::<_, CampSessionRow>(&sql)
        .bind(session_id)
        .bind(fields.name)
        .bind(fields.description)
        .bind(fields.starts_on)
        .bind(fields.ends_on)
        .bind(fields.price_cents)
        .bind(fields.capacity)
        .bind(fields.min_age)
        .bind(fields.max_age)
        .bind(fields.registration_form_id)
        .fetch_optional(conn)
        .await
}

pub async fn set_session_status(
    conn: &mut PgConnection,
    session_id: Uuid,
    status: &str,
) -> sqlx::Result<Option<CampSessionRow>> {
    let sql = format!(
        "UPDATE camp_sessions SET status = $2, updated_at = now() WHERE id = $1 RETURNING {SESSION_COLUMNS}"
    );
    sqlx::query_as::<_, CampSessionRow>(&sql)
        .bind(session_id)
        .bind(status)
        .fetch_optional(conn)
        .await
}

pub async fn load_session(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> sqlx::Result<Option<CampSessionRow>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM camp_sessions WHERE id = $1 LIMIT 1");
    sqlx::query_as::<_, CampSessionRow>(&sql)
        .bind(session_id)
        .fetch_optional(conn)
        .await
}

/// Loads the session and holds its row lock until the transaction ends, so
/// capacity decisions for one session never interleave.
pub async fn lock_session(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> sqlx::Result<Option<CampSessionRow>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM camp_sessions WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, CampSessionRow>(&sql)
        .bind(session_id)
        .fetch_optional(conn)
        .await
}

const SQL_LIST_OCCUPANCY: &str = r#"
SELECT
  s.id,
  s.name,
  s.starts_on,
  s.ends_on,
  s.price_cents,
  s.capacity,
  s.status,
  (
    SELECT COUNT(*)
    FROM registrations r
    WHERE r.session_id = s.id
      AND r.status = 'confirmed'
  ) AS enrolled,
  (
    SELECT COUNT(*)
    FROM waitlist_entries w
    WHERE w.session_id = s.id
      AND w.status = 'waiting'
  ) AS waiting,
  (
    SELECT COUNT(*)
    FROM waitlist_entries w
    WHERE w.session_id = s.id
      AND w.status = 'offered'
      AND w.offer_expires_at > now()
  ) AS offered
FROM camp_sessions s
WHERE ($1::TEXT IS NULL OR s.status = $1)
ORDER BY s.starts_on ASC, s.name ASC
"#;

pub async fn list_occupancy(
    conn: &mut PgConnection,
    status: Option<&str>,
) -> sqlx::Result<Vec<SessionOccupancyRow>> {
    sqlx::query_as::<_, SessionOccupancyRow>(SQL_LIST_OCCUPANCY)
        .bind(status)
        .fetch_all(conn)
        .await
}

pub async fn list_sessions_running_on(
    conn: &mut PgConnection,
    day: NaiveDate,
) -> sqlx::Result<Vec<CampSessionRow>> {
    let sql = format!(
        r#"
SELECT {SESSION_COLUMNS}
FROM camp_sessions
WHERE starts_on <= $1
  AND ends_on >= $1
  AND status <> 'draft'
ORDER BY name ASC
"#
    );
    sqlx::query_as::<_, CampSessionRow>(&sql)
        .bind(day)
        .fetch_all(conn)
        .await
}
