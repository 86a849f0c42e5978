//! Needs a Postgres instance: `DATABASE_URL=... cargo test -- --ignored`.

use sqlx::PgPool;
use uuid::Uuid;

use campdesk::database::tenant_context;

async fn insert_organization(conn: &mut sqlx::PgConnection, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO organizations (id, name, slug) VALUES ($1, $2, $3)")
        .bind(id)
        .bind("Pine Lake")
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_organization_is_transaction_local(pool: PgPool) -> sqlx::Result<()> {
    let org = Uuid::new_v4();

    let mut tx = tenant_context::begin(&pool, org).await?;
    assert_eq!(tenant_context::current_organization(&mut tx).await?, Some(org));
    tx.commit().await?;

    let mut conn = pool.acquire().await?;
    assert_eq!(tenant_context::current_organization(&mut conn).await?, None);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_failed_closure_rolls_back(pool: PgPool) -> sqlx::Result<()> {
    let org = Uuid::new_v4();

    let result: Result<(), sqlx::Error> =
        tenant_context::with_organization_context(&pool, org, move |conn| {
            Box::pin(async move {
                insert_organization(conn, org).await?;
                Err(sqlx::Error::RowNotFound)
            })
        })
        .await;
    assert!(result.is_err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations WHERE id = $1")
        .bind(org)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_successful_closure_commits(pool: PgPool) -> sqlx::Result<()> {
    let org = Uuid::new_v4();

    let seen = tenant_context::with_organization_context(&pool, org, move |conn| {
        Box::pin(async move {
            insert_organization(conn, org).await?;
            tenant_context::current_organization(conn).await
        })
    })
    .await?;
    assert_eq!(seen, Some(org));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations WHERE id = $1")
        .bind(org)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);
    Ok(())
}
