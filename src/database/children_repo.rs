use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::ChildRow;

const CHILD_COLUMNS: &str = r#"
  id,
  organization_id,
  guardian_id,
  first_name,
  last_name,
  date_of_birth,
  allergies,
  medical_notes,
  created_at,
  updated_at
"#;

pub struct NewChild<'a> {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub guardian_id: Uuid,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub date_of_birth: NaiveDate,
    pub allergies: Option<&'a str>,
    pub medical_notes: Option<&'a str>,
}

pub async fn insert_child(conn: &mut PgConnection, child: NewChild<'_>) -> sqlx::Result<ChildRow> {
    let sql = format!(
        r#"
INSERT INTO children (
  id,
  organization_id,
  guardian_id,
  first_name,
  last_name,
  date_of_birth,
  allergies,
  medical_notes
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
RETURNING {CHILD_COLUMNS}
"#
    );
    sqlx::query_as::<_, ChildRow>(&sql)
        .bind(child.id)
        .bind(child.organization_id)
        .bind(child.guardian_id)
        .bind(child.first_name)
        .bind(child.last_name)
        .bind(child.date_of_birth)
        .bind(child.allergies)
        .bind(child.medical_notes)
        .fetch_one(conn)
        .await
}

pub struct ChildUpdate<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub date_of_birth: NaiveDate,
    pub allergies: Option<&'a str>,
    pub medical_notes: Option<&'a str>,
}

pub async fn update_child(
    conn: &mut PgConnection,
    child_id: Uuid,
    update: ChildUpdate<'_>,
) -> sqlx::Result<Option<ChildRow>> {
    let sql = format!(
        r#"
UPDATE children
SET first_name = $2,
    last_name = $3,
    date_of_birth = $4,
    allergies = $5,
    medical_notes = $6,
    updated_at = now()
WHERE id = $1
RETURNING {CHILD_COLUMNS}
"#
    );
    sqlx::query_as::<_, ChildRow>(&sql)
        .bind(child_id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.date_of_birth)
        .bind(update.allergies)
        .bind(update.medical_notes)
        .fetch_optional(conn)
        .await
}

pub async fn load_child(conn: &mut PgConnection, child_id: Uuid) -> sqlx::Result<Option<ChildRow>> {
    let sql = format!("SELECT {CHILD_COLUMNS} FROM children WHERE id = $1 LIMIT 1");
    sqlx::query_as::<_, ChildRow>(&sql)
        .bind(child_id)
        .fetch_optional(conn)
        .await
}

pub async fn list_children_for_guardian(
    conn: &mut PgConnection,
    guardian_id: Uuid,
) -> sqlx::Result<Vec<ChildRow>> {
    let sql = format!(
        "SELECT {CHILD_COLUMNS} FROM children WHERE guardian_id = $1 ORDER BY first_name, last_name"
    );
    sqlx::query_as::<_, ChildRow>(&sql)
        .bind(guardian_id)
        .fetch_all(conn)
        .await
}

pub async fn list_children(conn: &mut PgConnection) -> sqlx::Result<Vec<ChildRow>> {
    let sql = format!("SELECT {CHILD_COLUMNS} FROM children ORDER BY last_name, first_name");
    sqlx::query_as::<_, ChildRow>(&sql).fetch_all(conn).await
}
