use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{OrganizationRow, UsersRow};

const SQL_LOAD_USER_BY_ID: &str = r#"
SELECT
  id,
  organization_id,
  email,
  full_name,
  role,
  phone,
  created_at
FROM users
WHERE id = $1
LIMIT 1
"#;

// Runs before any tenant is known; the users table is outside RLS.
pub async fn load_user_by_id(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Option<UsersRow>> {
    sqlx::query_as::<_, UsersRow>(SQL_LOAD_USER_BY_ID)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

const SQL_LOAD_ORG_USER: &str = r#"
SELECT
  id,
  organization_id,
  email,
  full_name,
  role,
  phone,
  created_at
FROM users
WHERE id = $1
  AND organization_id = $2
LIMIT 1
"#;

pub async fn load_org_user(
    conn: &mut PgConnection,
    organization_id: Uuid,
    user_id: Uuid,
) -> sqlx::Result<Option<UsersRow>> {
    sqlx::query_as::<_, UsersRow>(SQL_LOAD_ORG_USER)
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(conn)
        .await
}

const SQL_LOAD_ORGANIZATION: &str = r#"
SELECT
  id,
  name,
  slug,
  timezone,
  created_at
FROM organizations
WHERE id = $1
LIMIT 1
"#;

pub async fn load_organization(
    pool: &PgPool,
    organization_id: Uuid,
) -> sqlx::Result<Option<OrganizationRow>> {
    sqlx::query_as::<_, OrganizationRow>(SQL_LOAD_ORGANIZATION)
        .bind(organization_id)
        .fetch_optional(pool)
        .await
}
