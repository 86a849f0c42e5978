//! Tenant scoping for row-level security.
//!
//! Every tenant table carries a policy on `app.current_organization_id`. The
//! variable is set with `set_config(..., true)`, which is transaction-local, so it
//! lives exactly as long as the transaction on the one pooled connection that
//! runs the scoped queries. A connection returned to the pool carries no tenant.

use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

const SQL_SET_ORGANIZATION: &str =
    "SELECT set_config('app.current_organization_id', $1, true)";

const SQL_CURRENT_ORGANIZATION: &str =
    "SELECT NULLIF(current_setting('app.current_organization_id', true), '')";

/// Opens a transaction scoped to `organization_id`. Dropping it without
/// `commit` rolls back.
pub async fn begin(
    pool: &PgPool,
    organization_id: Uuid,
) -> sqlx::Result<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    sqlx::query(SQL_SET_ORGANIZATION)
        .bind(organization_id.to_string())
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Runs `f` inside a transaction scoped to `organization_id`. Commits when `f`
/// succeeds and rolls back when it fails.
///
/// ```ignore
/// let children = with_organization_context(&pool, org_id, move |conn| {
///     Box::pin(async move { Ok(children_repo::list_for_guardian(conn, guardian_id).await?) })
/// })
/// .await?;
/// ```
pub async fn with_organization_context<T, E, F>(
    pool: &PgPool,
    organization_id: Uuid,
    f: F,
) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: From<sqlx::Error> + Send,
{
    let mut tx = begin(pool, organization_id).await?;
    match f(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(%organization_id, error = %rollback_err, "tenant transaction rollback failed");
            }
            Err(err)
        }
    }
}

/// The organization the current transaction is scoped to, if any.
pub async fn current_organization(conn: &mut PgConnection) -> sqlx::Result<Option<Uuid>> {
    let raw: Option<String> = sqlx::query_scalar(SQL_CURRENT_ORGANIZATION)
        .fetch_one(conn)
        .await?;
    Ok(raw.and_then(|s| Uuid::parse_str(&s).ok()))
}
