use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{WaitlistEntryRow, WaitlistViewRow};

const ENTRY_COLUMNS: &str = r#"
  id,
  organization_id,
  child_id,
  session_id,
  position,
  status,
  offered_at,
  offer_expires_at,
  created_by,
  created_at,
  updated_at
"#;

pub struct NewWaitlistEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub child_id: Uuid,
    pub session_id: Uuid,
    pub created_by: Uuid,
}

/// Appends to the tail of the session's waitlist. Callers hold the session lock.
pub async fn insert_entry(
    conn: &mut PgConnection,
    entry: NewWaitlistEntry,
) -> sqlx::Result<WaitlistEntryRow> {
    let sql = format!(
        r#"
INSERT INTO waitlist_entries (
  id,
  organization_id,
  child_id,
  session_id,
  position,
  status,
  created_by
)
SELECT
  $1, $2, $3, $4,
  COALESCE(MAX(position), 0) + 1,
  'waiting',
  $5
FROM waitlist_entries
WHERE session_id = $4
RETURNING {ENTRY_COLUMNS}
"#
    );
    sqlx::query_as::<_, WaitlistEntryRow>(&sql)
        .bind(entry.id)
        .bind(entry.organization_id)
        .bind(entry.child_id)
        .bind(entry.session_id)
        .bind(entry.created_by)
        .fetch_one(conn)
        .await
}

pub async fn load_entry(
    conn: &mut PgConnection,
    entry_id: Uuid,
) -> sqlx::Result<Option<WaitlistEntryRow>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM waitlist_entries WHERE id = $1 LIMIT 1");
    sqlx::query_as::<_, WaitlistEntryRow>(&sql)
        .bind(entry_id)
        .fetch_optional(conn)
        .await
}

pub async fn find_open_for_child(
    conn: &mut PgConnection,
    child_id: Uuid,
    session_id: Uuid,
) -> sqlx::Result<Option<WaitlistEntryRow>> {
    let sql = format!(
        r#"
SELECT {ENTRY_COLUMNS}
FROM waitlist_entries
WHERE child_id = $1
  AND session_id = $2
  AND status IN ('waiting', 'offered')
LIMIT 1
"#
    );
    sqlx::query_as::<_, WaitlistEntryRow>(&sql)
        .bind(child_id)
        .bind(session_id)
        .fetch_optional(conn)
        .await
}

const SQL_COUNT_LIVE_OFFERS: &str = r#"
SELECT COUNT(*)
FROM waitlist_entries
WHERE session_id = $1
  AND status = 'offered'
  AND offer_expires_at > $2
"#;

pub async fn count_live_offers(
    conn: &mut PgConnection,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(SQL_COUNT_LIVE_OFFERS)
        .bind(session_id)
        .bind(now)
        .fetch_one(conn)
        .await
}

/// Marks every offer past its expiry as expired, optionally limited to one
/// session, and returns the affected entries.
pub async fn expire_stale_offers(
    conn: &mut PgConnection,
    session_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<WaitlistEntryRow>> {
    let sql = format!(
        r#"
UPDATE waitlist_entries
SET status = 'expired',
    updated_at = now()
WHERE status = 'offered'
  AND offer_expires_at <= $2
  AND ($1::UUID IS NULL OR session_id = $1)
RETURNING {ENTRY_COLUMNS}
"#
    );
    sqlx::query_as::<_, WaitlistEntryRow>(&sql)
        .bind(session_id)
        .bind(now)
        .fetch_all(conn)
        .await
}

const SQL_LIST_STALE_OFFER_SESSIONS: &str = r#"
SELECT DISTINCT w.session_id
FROM waitlist_entries w
JOIN children c ON c.id = w.child_id
WHERE w.status = 'offered'
  AND w.offer_expires_at <= $2
  AND ($1::UUID IS NULL OR c.guardian_id = $1)
"#;

/// Sessions holding an expired offer, optionally only those where one of
/// `guardian_id`'s children is in the queue.
pub async fn list_stale_offer_sessions(
    conn: &mut PgConnection,
    guardian_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<Uuid>> {
    sqlx::query_scalar(SQL_LIST_STALE_OFFER_SESSIONS)
        .bind(guardian_id)
        .bind(now)
        .fetch_all(conn)
        .await
}

pub async fn next_waiting(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> sqlx::Result<Option<WaitlistEntryRow>> {
    let sql = format!(
        r#"
SELECT {ENTRY_COLUMNS}
FROM waitlist_entries
WHERE session_id = $1
  AND status = 'waiting'
ORDER BY position ASC, created_at ASC
LIMIT 1
"#
    );
    sqlx::query_as::<_, WaitlistEntryRow>(&sql)
        .bind(session_id)
        .fetch_optional(conn)
        .await
}

pub async fn mark_offered(
    conn: &mut PgConnection,
    entry_id: Uuid,
    offered_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> sqlx::Result<WaitlistEntryRow> {
    let sql = format!(
        r#"
UPDATE waitlist_entries
SET status = 'offered',
    offered_at = $2,
    offer_expires_at = $3,
    updated_at = now()
WHERE id = $1
RETURNING {ENTRY_COLUMNS}
"#
    );
    sqlx::query_as::<_, WaitlistEntryRow>(&sql)
        .bind(entry_id)
        .bind(offered_at)
        .bind(expires_at)
        .fetch_one(conn)
        .await
}

/// Moves an entry to `status` only if it is currently in one of `from`.
pub async fn transition(
    conn: &mut PgConnection,
    entry_id: Uuid,
    from: &[&str],
    status: &str,
) -> sqlx::Result<Option<WaitlistEntryRow>> {
    let sql = format!(
        r#"
UPDATE waitlist_entries
SET status = $3,
    updated_at = now()
WHERE id = $1
  AND status = ANY($2)
RETURNING {ENTRY_COLUMNS}
"#
    );
    let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();
    sqlx::query_as::<_, WaitlistEntryRow>(&sql)
        .bind(entry_id)
        .bind(from)
        .bind(status)
        .fetch_optional(conn)
        .await
}

const SQL_LIST_WAITING_IDS: &str = r#"
SELECT id
FROM waitlist_entries
WHERE session_id = $1
  AND status = 'waiting'
ORDER BY position ASC, created_at ASC
"#;

pub async fn list_waiting_ids(conn: &mut PgConnection, session_id: Uuid) -> sqlx::Result<Vec<Uuid>> {
    sqlx::query_scalar(SQL_LIST_WAITING_IDS)
        .bind(session_id)
        .fetch_all(conn)
        .await
}

const SQL_SET_POSITIONS: &str = r#"
UPDATE waitlist_entries w
SET position = p.position,
    updated_at = now()
FROM UNNEST($1::UUID[], $2::INT[]) AS p(id, position)
WHERE w.id = p.id
"#;

pub async fn set_positions(
    conn: &mut PgConnection,
    positions: &[(Uuid, i32)],
) -> sqlx::Result<u64> {
    let ids: Vec<Uuid> = positions.iter().map(|(id, _)| *id).collect();
    let values: Vec<i32> = positions.iter().map(|(_, p)| *p).collect();
    let res = sqlx::query(SQL_SET_POSITIONS)
        .bind(ids)
        .bind(values)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

const SQL_VIEW_SELECT: &str = r#"
SELECT
  w.id,
  w.child_id,
  c.first_name || ' ' || c.last_name AS child_name,
  w.session_id,
  s.name AS session_name,
  w.status,
  CASE WHEN w.status = 'waiting' THEN (
    SELECT COUNT(*)
    FROM waitlist_entries ahead
    WHERE ahead.session_id = w.session_id
      AND ahead.status = 'waiting'
      AND (ahead.position, ahead.created_at) <= (w.position, w.created_at)
  ) END AS rank,
  w.offer_expires_at,
  w.created_at
FROM waitlist_entries w
JOIN children c ON c.id = w.child_id
JOIN camp_sessions s ON s.id = w.session_id
"#;

pub async fn list_open_for_guardian(
    conn: &mut PgConnection,
    guardian_id: Uuid,
) -> sqlx::Result<Vec<WaitlistViewRow>> {
    let sql = format!(
        "{SQL_VIEW_SELECT} WHERE c.guardian_id = $1 AND w.status IN ('waiting', 'offered') ORDER BY s.starts_on, w.position"
    );
    sqlx::query_as::<_, WaitlistViewRow>(&sql)
        .bind(guardian_id)
        .fetch_all(conn)
        .await
}

pub async fn list_open_for_session(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> sqlx::Result<Vec<WaitlistViewRow>> {
    let sql = format!(
        "{SQL_VIEW_SELECT} WHERE w.session_id = $1 AND w.status IN ('waiting', 'offered') ORDER BY w.status ASC, w.position"
    );
    sqlx::query_as::<_, WaitlistViewRow>(&sql)
        .bind(session_id)
        .fetch_all(conn)
        .await
}
