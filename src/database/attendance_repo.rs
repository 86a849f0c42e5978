use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{AttendanceRow, RosterRow};

const ATTENDANCE_COLUMNS: &str = r#"
  id,
  organization_id,
  child_id,
  session_id,
  attendance_date,
  status,
  checked_in_at,
  checked_in_by,
  checked_out_at,
  checked_out_by,
  note
"#;

pub struct AttendanceMark<'a> {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub child_id: Uuid,
    pub session_id: Uuid,
    pub attendance_date: NaiveDate,
    pub staff_id: Uuid,
    pub at: DateTime<Utc>,
    pub note: Option<&'a str>,
}

/// Records a check-in. A second check-in on the same day keeps the first time.
pub async fn check_in(conn: &mut PgConnection, mark: AttendanceMark<'_>) -> sqlx::Result<AttendanceRow> {
    let sql = format!(
        r#"
INSERT INTO attendance_records (
  id,
  organization_id,
  child_id,
  session_id,
  attendance_date,
  status,
  checked_in_at,
  checked_in_by,
  note
) VALUES ($1, $2, $3, $4, $5, 'present', $6, $7, $8)
ON CONFLICT (child_id, session_id, attendance_date) DO UPDATE
SET status = 'present',
    checked_in_at = COALESCE(attendance_records.checked_in_at, EXCLUDED.checked_in_at),
    checked_in_by = COALESCE(attendance_records.checked_in_by, EXCLUDED.checked_in_by),
    note = COALESCE(EXCLUDED.note, attendance_records.note)
RETURNING {ATTENDANCE_COLUMNS}
"#
    );
    sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(mark.id)
        .bind(mark.organization_id)
        .bind(mark.child_id)
        .bind(mark.session_id)
        .bind(mark.attendance_date)
        .bind(mark.at)
        .bind(mark.staff_id)
        .bind(mark.note)
        .fetch_one(conn)
        .await
}

/// Returns `None` when the child was not checked in, or is already checked out.
pub async fn check_out(
    conn: &mut PgConnection,
    mark: AttendanceMark<'_>,
) -> sqlx::Result<Option<AttendanceRow>> {
    let sql = format!(
        r#"
UPDATE attendance_records
SET checked_out_at = $4,
    checked_out_by = $5,
    note = COALESCE($6, note)
WHERE child_id = $1
  AND session_id = $2
  AND attendance_date = $3
  AND checked_in_at IS NOT NULL
  AND checked_out_at IS NULL
RETURNING {ATTENDANCE_COLUMNS}
"#
    );
    sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(mark.child_id)
        .bind(mark.session_id)
        .bind(mark.attendance_date)
        .bind(mark.at)
        .bind(mark.staff_id)
        .bind(mark.note)
        .fetch_optional(conn)
        .await
}

/// Returns `None` when the child has already been checked in that day.
pub async fn mark_absent(
    conn: &mut PgConnection,
    mark: AttendanceMark<'_>,
) -> sqlx::Result<Option<AttendanceRow>> {
    let sql = format!(
        r#"
INSERT INTO attendance_records (
  id,
  organization_id,
  child_id,
  session_id,
  attendance_date,
  status,
  note
) VALUES ($1, $2, $3, $4, $5, 'absent', $6)
ON CONFLICT (child_id, session_id, attendance_date) DO UPDATE
SET status = 'absent',
    note = COALESCE(EXCLUDED.note, attendance_records.note)
WHERE attendance_records.checked_in_at IS NULL
RETURNING {ATTENDANCE_COLUMNS}
"#
    );
    sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(mark.id)
        .bind(mark.organization_id)
        .bind(mark.child_id)
        .bind(mark.session_id)
        .bind(mark.attendance_date)
        .bind(mark.note)
        .fetch_optional(conn)
        .await
}

const SQL_LOAD_ROSTER: &str = r#"
SELECT
  c.id AS child_id,
  c.first_name || ' ' || c.last_name AS child_name,
  c.allergies,
  a.status,
  a.checked_in_at,
  a.checked_out_at
FROM registrations r
JOIN children c ON c.id = r.child_id
LEFT JOIN attendance_records a
  ON a.child_id = r.child_id
  AND a.session_id = r.session_id
  AND a.attendance_date = $2
WHERE r.session_id = $1
  AND r.status = 'confirmed'
ORDER BY c.last_name ASC, c.first_name ASC
"#;

pub async fn load_roster(
    conn: &mut PgConnection,
    session_id: Uuid,
    day: NaiveDate,
) -> sqlx::Result<Vec<RosterRow>> {
    sqlx::query_as::<_, RosterRow>(SQL_LOAD_ROSTER)
        .bind(session_id)
        .bind(day)
        .fetch_all(conn)
        .await
}
