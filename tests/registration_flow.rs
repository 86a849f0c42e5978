//! Registration and waitlist rules against a real database.
//! Needs a Postgres instance: `DATABASE_URL=... cargo test -- --ignored`.

use chrono::Duration;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use campdesk::database::tenant_context;
use campdesk::models::Role;
use campdesk::permissions::Actor;
use campdesk::services::registration_service::{self, RegisterInput, RegistrationOutcome};
use campdesk::services::waitlist_service;
use campdesk::AppError;

const PRICE_CENTS: i64 = 25_000;

fn window() -> Duration {
    Duration::hours(48)
}

struct Camp {
    organization_id: Uuid,
    admin: Actor,
    staff: Actor,
}

impl Camp {
    async fn seed(pool: &PgPool) -> sqlx::Result<Self> {
        let organization_id = Uuid::new_v4();
        sqlx::query("INSERT INTO organizations (id, name, slug) VALUES ($1, 'Pine Lake', $2)")
            .bind(organization_id)
            .bind(organization_id.to_string())
            .execute(pool)
            .await?;
        let admin = add_user(pool, organization_id, Role::Admin).await?;
        let staff = add_user(pool, organization_id, Role::Staff).await?;
        Ok(Self {
            organization_id,
            admin,
            staff,
        })
    }

    async fn parent(&self, pool: &PgPool) -> sqlx::Result<Actor> {
        add_user(pool, self.organization_id, Role::Parent).await
    }

    async fn child(&self, pool: &PgPool, guardian: &Actor) -> sqlx::Result<Uuid> {
        let id = Uuid::new_v4();
        let mut tx = tenant_context::begin(pool, self.organization_id).await?;
        sqlx::query(
            "INSERT INTO children (id, organization_id, guardian_id, first_name, last_name, date_of_birth)
             VALUES ($1, $2, $3, 'Sam', 'Jansen', DATE '2018-04-02')",
        )
        .bind(id)
        .bind(self.organization_id)
        .bind(guardian.user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn open_session(&self, pool: &PgPool, capacity: i32) -> sqlx::Result<Uuid> {
        let id = Uuid::new_v4();
        let mut tx = tenant_context::begin(pool, self.organization_id).await?;
        sqlx::query(
            "INSERT INTO camp_sessions (id, organization_id, name, starts_on, ends_on, price_cents, capacity, status)
             VALUES ($1, $2, 'Week one', DATE '2030-07-01', DATE '2030-07-05', $3, $4, 'open')",
        )
        .bind(id)
        .bind(self.organization_id)
        .bind(PRICE_CENTS)
        .bind(capacity)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn entry_status(&self, pool: &PgPool, entry_id: Uuid) -> sqlx::Result<String> {
        let mut tx = tenant_context::begin(pool, self.organization_id).await?;
        let status = sqlx::query_scalar("SELECT status FROM waitlist_entries WHERE id = $1")
            .bind(entry_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(status)
    }
}

async fn add_user(pool: &PgPool, organization_id: Uuid, role: Role) -> sqlx::Result<Actor> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, organization_id, email, full_name, role) VALUES ($1, $2, $3, 'Test User', $4)",
    )
    .bind(id)
    .bind(organization_id)
    .bind(format!("{id}@example.com"))
    .bind(role.as_str())
    .execute(pool)
    .await?;
    Ok(Actor {
        user_id: id,
        organization_id,
        role,
    })
}

async fn register(
    pool: &PgPool,
    actor: &Actor,
    child_id: Uuid,
    session_id: Uuid,
) -> Result<RegistrationOutcome, AppError> {
    registration_service::register(
        pool,
        actor,
        RegisterInput {
            child_id,
            session_id,
            answers: None,
        },
        window(),
    )
    .await
}

async fn confirmed(pool: &PgPool, actor: &Actor, child_id: Uuid, session_id: Uuid) -> Uuid {
    match register(pool, actor, child_id, session_id).await {
        Ok(RegistrationOutcome::Confirmed { registration }) => registration.id,
        other => panic!("expected a confirmed seat, got {other:?}"),
    }
}

async fn waitlisted(pool: &PgPool, actor: &Actor, child_id: Uuid, session_id: Uuid) -> Uuid {
    match register(pool, actor, child_id, session_id).await {
        Ok(RegistrationOutcome::Waitlisted { entry }) => entry.id,
        other => panic!("expected a waitlist entry, got {other:?}"),
    }
}

async fn expire_offer(conn: &mut PgConnection, entry_id: Uuid) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE waitlist_entries SET offer_expires_at = now() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(entry_id)
    .execute(conn)
    .await?;
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_full_session_waitlists_and_refuses_duplicates(pool: PgPool) -> Result<(), AppError> {
    let camp = Camp::seed(&pool).await?;
    let (first, second) = (camp.parent(&pool).await?, camp.parent(&pool).await?);
    let first_child = camp.child(&pool, &first).await?;
    let second_child = camp.child(&pool, &second).await?;
    let session = camp.open_session(&pool, 1).await?;

    confirmed(&pool, &first, first_child, session).await;
    waitlisted(&pool, &second, second_child, session).await;

    assert!(matches!(
        register(&pool, &first, first_child, session).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        register(&pool, &second, second_child, session).await,
        Err(AppError::Conflict(_))
    ));
    // Another family's child is invisible to this parent.
    assert!(matches!(
        register(&pool, &first, second_child, session).await,
        Err(AppError::NotFound(_))
    ));
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_cancel_voids_fee_and_offer_is_accepted(pool: PgPool) -> Result<(), AppError> {
    let camp = Camp::seed(&pool).await?;
    let (first, second) = (camp.parent(&pool).await?, camp.parent(&pool).await?);
    let first_child = camp.child(&pool, &first).await?;
    let second_child = camp.child(&pool, &second).await?;
    let session = camp.open_session(&pool, 1).await?;

    let registration = confirmed(&pool, &first, first_child, session).await;
    let entry = waitlisted(&pool, &second, second_child, session).await;

    let cancelled = registration_service::cancel(&pool, &first, registration, window()).await?;
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(camp.entry_status(&pool, entry).await?, "offered");

    let mut tx = tenant_context::begin(&pool, camp.organization_id).await?;
    let open_charges: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM charges WHERE registration_id = $1 AND voided_at IS NULL",
    )
    .bind(registration)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    assert_eq!(open_charges, 0);

    let seat = waitlist_service::accept_offer(&pool, &second, entry, window()).await?;
    assert_eq!(seat.status, "confirmed");
    assert_eq!(seat.child_id, second_child);
    assert_eq!(camp.entry_status(&pool, entry).await?, "accepted");

    let mut tx = tenant_context::begin(&pool, camp.organization_id).await?;
    let fee: i64 = sqlx::query_scalar(
        "SELECT amount_cents FROM charges WHERE registration_id = $1 AND voided_at IS NULL",
    )
    .bind(seat.id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    assert_eq!(fee, PRICE_CENTS);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_expired_offer_moves_to_next_in_line(pool: PgPool) -> Result<(), AppError> {
    let camp = Camp::seed(&pool).await?;
    let holder = camp.parent(&pool).await?;
    let (late, next) = (camp.parent(&pool).await?, camp.parent(&pool).await?);
    let session = camp.open_session(&pool, 1).await?;

    let holder_child = camp.child(&pool, &holder).await?;
    let registration = confirmed(&pool, &holder, holder_child, session).await;
    let late_child = camp.child(&pool, &late).await?;
    let late_entry = waitlisted(&pool, &late, late_child, session).await;
    let next_child = camp.child(&pool, &next).await?;
    let next_entry = waitlisted(&pool, &next, next_child, session).await;

    registration_service::cancel(&pool, &holder, registration, window()).await?;
    assert_eq!(camp.entry_status(&pool, late_entry).await?, "offered");
    assert_eq!(camp.entry_status(&pool, next_entry).await?, "waiting");

    let mut tx = tenant_context::begin(&pool, camp.organization_id).await?;
    expire_offer(&mut tx, late_entry).await?;
    tx.commit().await?;

    let report = waitlist_service::sweep(&pool, &camp.admin, window()).await?;
    assert_eq!(report.expired, vec![late_entry]);
    assert_eq!(report.offered, vec![next_entry]);

    assert!(matches!(
        waitlist_service::accept_offer(&pool, &late, late_entry, window()).await,
        Err(AppError::Conflict(_))
    ));
    let seat = waitlist_service::accept_offer(&pool, &next, next_entry, window()).await?;
    assert_eq!(seat.child_id, next_child);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_guardian_dashboard_expires_only_their_sessions(pool: PgPool) -> Result<(), AppError> {
    let camp = Camp::seed(&pool).await?;
    let (holder, mine, theirs) = (
        camp.parent(&pool).await?,
        camp.parent(&pool).await?,
        camp.parent(&pool).await?,
    );
    let my_session = camp.open_session(&pool, 1).await?;
    let other_session = camp.open_session(&pool, 1).await?;

    let mut entries = Vec::new();
    for (session, guardian) in [(my_session, &mine), (other_session, &theirs)] {
        let holder_child = camp.child(&pool, &holder).await?;
        let registration = confirmed(&pool, &holder, holder_child, session).await;
        let child = camp.child(&pool, guardian).await?;
        let entry = waitlisted(&pool, guardian, child, session).await;
        registration_service::cancel(&pool, &holder, registration, window()).await?;
        entries.push(entry);
    }

    let mut tx = tenant_context::begin(&pool, camp.organization_id).await?;
    for entry in &entries {
        expire_offer(&mut tx, *entry).await?;
    }
    let report = waitlist_service::expire_and_promote_for_guardian(
        &mut tx,
        mine.user_id,
        chrono::Utc::now(),
        window(),
    )
    .await?;
    tx.commit().await?;

    assert_eq!(report.expired, vec![entries[0]]);
    assert_eq!(camp.entry_status(&pool, entries[1]).await?, "offered");
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_only_the_family_or_a_manager_handles_an_offer(pool: PgPool) -> Result<(), AppError> {
    let camp = Camp::seed(&pool).await?;
    let (holder, family, stranger) = (
        camp.parent(&pool).await?,
        camp.parent(&pool).await?,
        camp.parent(&pool).await?,
    );
    let session = camp.open_session(&pool, 1).await?;
    let holder_child = camp.child(&pool, &holder).await?;
    let registration = confirmed(&pool, &holder, holder_child, session).await;
    let child = camp.child(&pool, &family).await?;
    let entry = waitlisted(&pool, &family, child, session).await;
    registration_service::cancel(&pool, &holder, registration, window()).await?;

    for outsider in [&camp.staff, &stranger] {
        assert!(matches!(
            waitlist_service::decline_offer(&pool, outsider, entry, window()).await,
            Err(AppError::NotFound(_))
        ));
    }
    assert_eq!(camp.entry_status(&pool, entry).await?, "offered");

    let declined = waitlist_service::decline_offer(&pool, &camp.admin, entry, window()).await?;
    assert_eq!(declined.status, "declined");
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_moved_entry_keeps_its_rank(pool: PgPool) -> Result<(), AppError> {
    let camp = Camp::seed(&pool).await?;
    let session = camp.open_session(&pool, 0).await?;

    let mut entries = Vec::new();
    for _ in 0..3 {
        let parent = camp.parent(&pool).await?;
        let child = camp.child(&pool, &parent).await?;
        entries.push(waitlisted(&pool, &parent, child, session).await);
    }

    let moved = waitlist_service::move_entry(&pool, &camp.admin, entries[2], 1).await?;
    let order: Vec<Uuid> = moved.iter().map(|row| row.id).collect();
    assert_eq!(order, vec![entries[2], entries[0], entries[1]]);

    let listed = waitlist_service::list_for_session(&pool, &camp.admin, session, window()).await?;
    let ranks: Vec<(Uuid, Option<i64>)> = listed.iter().map(|row| (row.id, row.rank)).collect();
    assert_eq!(
        ranks,
        vec![
            (entries[2], Some(1)),
            (entries[0], Some(2)),
            (entries[1], Some(3)),
        ]
    );

    assert!(matches!(
        waitlist_service::move_entry(&pool, &camp.staff, entries[0], 1).await,
        Err(AppError::Forbidden)
    ));
    Ok(())
}

/// Superusers bypass row-level security, so isolation is checked under a
/// plain role.
#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_rows_stay_inside_their_organization(pool: PgPool) -> Result<(), AppError> {
    sqlx::query(
        "DO $$ BEGIN
           IF NOT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = 'campdesk_tenant') THEN
             CREATE ROLE campdesk_tenant NOLOGIN;
           END IF;
         END $$",
    )
    .execute(&pool)
    .await?;
    sqlx::query("GRANT USAGE ON SCHEMA public TO campdesk_tenant")
        .execute(&pool)
        .await?;
    sqlx::query("GRANT SELECT, INSERT ON children TO campdesk_tenant")
        .execute(&pool)
        .await?;

    let north = Camp::seed(&pool).await?;
    let south = Camp::seed(&pool).await?;
    let parent = north.parent(&pool).await?;
    let child = north.child(&pool, &parent).await?;

    let mut tx = tenant_context::begin(&pool, north.organization_id).await?;
    sqlx::query("SET LOCAL ROLE campdesk_tenant").execute(&mut *tx).await?;
    let visible: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM children WHERE id = $1")
        .bind(child)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;
    assert_eq!(visible, 1);

    let mut tx = tenant_context::begin(&pool, south.organization_id).await?;
    sqlx::query("SET LOCAL ROLE campdesk_tenant").execute(&mut *tx).await?;
    let visible: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM children")
        .fetch_one(&mut *tx)
        .await?;
    assert_eq!(visible, 0);

    // Writing into another organization fails the policy check.
    let smuggled = sqlx::query(
        "INSERT INTO children (id, organization_id, guardian_id, first_name, last_name, date_of_birth)
         VALUES ($1, $2, $3, 'Eve', 'Jansen', DATE '2018-04-02')",
    )
    .bind(Uuid::new_v4())
    .bind(north.organization_id)
    .bind(parent.user_id)
    .execute(&mut *tx)
    .await;
    assert!(smuggled.is_err());
    tx.rollback().await?;

    // No organization set: nothing is visible at all.
    let mut tx = pool.begin().await?;
    sqlx::query("SET LOCAL ROLE campdesk_tenant").execute(&mut *tx).await?;
    let visible: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM children")
        .fetch_one(&mut *tx)
        .await?;
    tx.rollback().await?;
    assert_eq!(visible, 0);
    Ok(())
}
