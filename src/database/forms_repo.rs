use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::forms::FieldDefinition;
use crate::models::{FormDefinitionRow, FormSubmissionRow, FormVersionRow, OutstandingFormRow};

const DEFINITION_COLUMNS: &str = r#"
  id,
  organization_id,
  name,
  description,
  form_kind,
  fields,
  status,
  current_version,
  created_by,
  created_at,
  updated_at
"#;

const VERSION_COLUMNS: &str = r#"
  id,
  organization_id,
  form_id,
  version,
  fields,
  published_by,
  published_at
"#;

const SUBMISSION_COLUMNS: &str = r#"
  id,
  organization_id,
  form_id,
  form_version_id,
  version,
  child_id,
  submitted_by,
  answers,
  created_at
"#;

pub struct NewFormDefinition<'a> {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub form_kind: &'a str,
    pub fields: &'a [FieldDefinition],
    pub created_by: Uuid,
}

pub async fn insert_definition(
    conn: &mut PgConnection,
    form: NewFormDefinition<'_>,
) -> sqlx::Result<FormDefinitionRow> {
    let sql = format!(
        r#"
INSERT INTO form_definitions (
  id,
  organization_id,
  name,
  description,
  form_kind,
  fields,
  created_by
) VALUES ($1, $2, $3, $4, $5, $6, $7)
RETURNING {DEFINITION_COLUMNS}
"#
    );
    sqlx::query_as::<_, FormDefinitionRow>(&sql)
        .bind(form.id)
        .bind(form.organization_id)
        .bind(form.name)
        .bind(form.description)
        .bind(form.form_kind)
        .bind(Json(form.fields))
        .bind(form.created_by)
        .fetch_one(conn)
        .await
}

/// Replaces the draft fields. Published snapshots are untouched.
pub async fn update_draft(
    conn: &mut PgConnection,
    form_id: Uuid,
    name: &str,
    description: Option<&str>,
    form_kind: &str,
    fields: &[FieldDefinition],
) -> sqlx::Result<FormDefinitionRow> {
    let sql = format!(
        r#"
UPDATE form_definitions
SET name = $2,
    description = $3,
    form_kind = $4,
    fields = $5,
    updated_at = now()
WHERE id = $1
RETURNING {DEFINITION_COLUMNS}
"#
    );
    sqlx::query_as::<_, FormDefinitionRow>(&sql)
        .bind(form_id)
        .bind(name)
        .bind(description)
        .bind(form_kind)
        .bind(Json(fields))
        .fetch_one(conn)
        .await
}

pub async fn load_definition(
    conn: &mut PgConnection,
    form_id: Uuid,
) -> sqlx::Result<Option<FormDefinitionRow>> {
    let sql = format!("SELECT {DEFINITION_COLUMNS} FROM form_definitions WHERE id = $1 LIMIT 1");
    sqlx::query_as::<_, FormDefinitionRow>(&sql)
        .bind(form_id)
        .fetch_optional(conn)
        .await
}

pub async fn lock_definition(
    conn: &mut PgConnection,
    form_id: Uuid,
) -> sqlx::Result<Option<FormDefinitionRow>> {
    let sql = format!("SELECT {DEFINITION_COLUMNS} FROM form_definitions WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, FormDefinitionRow>(&sql)
        .bind(form_id)
        .fetch_optional(conn)
        .await
}

pub async fn list_definitions(conn: &mut PgConnection) -> sqlx::Result<Vec<FormDefinitionRow>> {
    let sql = format!(
        "SELECT {DEFINITION_COLUMNS} FROM form_definitions WHERE status <> 'archived' ORDER BY name ASC"
    );
    sqlx::query_as::<_, FormDefinitionRow>(&sql).fetch_all(conn).await
}

pub async fn set_status(
    conn: &mut PgConnection,
    form_id: Uuid,
    status: &str,
    current_version: i32,
) -> sqlx::Result<FormDefinitionRow> {
    let sql = format!(
        r#"
UPDATE form_definitions
SET status = $2,
    current_version = $3,
    updated_at = now()
WHERE id = $1
RETURNING {DEFINITION_COLUMNS}
"#
    );
    sqlx::query_as::<_, FormDefinitionRow>(&sql)
        .bind(form_id)
        .bind(status)
        .bind(current_version)
        .fetch_one(conn)
        .await
}

pub async fn insert_version(
    conn: &mut PgConnection,
    id: Uuid,
    form: &FormDefinitionRow,
    version: i32,
    published_by: Uuid,
) -> sqlx::Result<FormVersionRow> {
    let sql = format!(
        r#"
INSERT INTO form_versions (
  id,
  organization_id,
  form_id,
  version,
  fields,
  published_by
) VALUES ($1, $2, $3, $4, $5, $6)
RETURNING {VERSION_COLUMNS}
"#
    );
    sqlx::query_as::<_, FormVersionRow>(&sql)
        .bind(id)
        .bind(form.organization_id)
        .bind(form.id)
        .bind(version)
        .bind(Json(&form.fields.0))
        .bind(published_by)
        .fetch_one(conn)
        .await
}

pub async fn load_version(
    conn: &mut PgConnection,
    form_id: Uuid,
    version: i32,
) -> sqlx::Result<Option<FormVersionRow>> {
    let sql = format!(
        "SELECT {VERSION_COLUMNS} FROM form_versions WHERE form_id = $1 AND version = $2 LIMIT 1"
    );
    sqlx::query_as::<_, FormVersionRow>(&sql)
        .bind(form_id)
        .bind(version)
        .fetch_optional(conn)
        .await
}

pub struct NewSubmission<'a> {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub version: &'a FormVersionRow,
    pub child_id: Option<Uuid>,
    pub submitted_by: Uuid,
    pub answers: &'a serde_json::Value,
}

pub async fn insert_submission(
    conn: &mut PgConnection,
    submission: NewSubmission<'_>,
) -> sqlx::Result<FormSubmissionRow> {
    let sql = format!(
        r#"
INSERT INTO form_submissions (
  id,
  organization_id,
  form_id,
  form_version_id,
  version,
  child_id,
  submitted_by,
  answers
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
RETURNING {SUBMISSION_COLUMNS}
"#
    );
    sqlx::query_as::<_, FormSubmissionRow>(&sql)
        .bind(submission.id)
        .bind(submission.organization_id)
        .bind(submission.version.form_id)
        .bind(submission.version.id)
        .bind(submission.version.version)
        .bind(submission.child_id)
        .bind(submission.submitted_by)
        .bind(Json(submission.answers))
        .fetch_one(conn)
        .await
}

pub async fn list_submissions(
    conn: &mut PgConnection,
    form_id: Uuid,
    limit: i64,
) -> sqlx::Result<Vec<FormSubmissionRow>> {
    let sql = format!(
        r#"
SELECT {SUBMISSION_COLUMNS}
FROM form_submissions
WHERE form_id = $1
ORDER BY created_at DESC
LIMIT $2
"#
    );
    sqlx::query_as::<_, FormSubmissionRow>(&sql)
        .bind(form_id)
        .bind(limit)
        .fetch_all(conn)
        .await
}

const SQL_LIST_OUTSTANDING_FOR_GUARDIAN: &str = r#"
SELECT
  f.id AS form_id,
  f.name AS form_name,
  f.form_kind,
  c.id AS child_id,
  c.first_name || ' ' || c.last_name AS child_name
FROM children c
CROSS JOIN form_definitions f
WHERE c.guardian_id = $1
  AND f.status = 'published'
  AND f.form_kind IN ('medical', 'consent')
  AND NOT EXISTS (
    SELECT 1
    FROM form_submissions s
    WHERE s.form_id = f.id
      AND s.child_id = c.id
  )
ORDER BY c.first_name ASC, f.name ASC
"#;

pub async fn list_outstanding_for_guardian(
    conn: &mut PgConnection,
    guardian_id: Uuid,
) -> sqlx::Result<Vec<OutstandingFormRow>> {
    sqlx::query_as::<_, OutstandingFormRow>(SQL_LIST_OUTSTANDING_FOR_GUARDIAN)
        .bind(guardian_id)
        .fetch_all(conn)
        .await
}
