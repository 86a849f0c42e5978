use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::database::tenant_context::{self, with_organization_context};
use crate::database::{
    billing_repo, camp_sessions_repo, children_repo, events_repo, forms_repo, incidents_repo,
    registrations_repo, users_repo, waitlist_repo,
};
use crate::error::AppError;
use crate::models::{
    ChildRow, EventRow, IncidentRow, OrganizationRow, OutstandingFormRow, RegistrationSummaryRow,
    WaitlistViewRow,
};
use crate::permissions::{Actor, Permission};
use crate::services::attendance_service::{self, Roster};
use crate::services::billing_service::{self, Balance, OrganizationSummary};
use crate::services::sessions_service::SessionListing;
use crate::services::waitlist_service;

const RECENT_EVENTS: i64 = 25;

#[derive(Debug, Serialize)]
pub struct ParentDashboard {
    pub children: Vec<ChildRow>,
    pub registrations: Vec<RegistrationSummaryRow>,
    pub waitlist: Vec<WaitlistViewRow>,
    pub balance: Balance,
    pub outstanding_forms: Vec<OutstandingFormRow>,
    pub incidents: Vec<IncidentRow>,
}

#[derive(Debug, Serialize)]
pub struct StaffDashboard {
    pub date: NaiveDate,
    pub sessions: Vec<Roster>,
    pub open_incidents: Vec<IncidentRow>,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub organization: OrganizationRow,
    pub sessions: Vec<SessionListing>,
    pub billing: OrganizationSummary,
    pub recent_events: Vec<EventRow>,
}

/// Everything a parent sees on one page. Stale offers are expired first so
/// ranks and offer deadlines are current.
pub async fn parent_dashboard(
    pool: &PgPool,
    actor: &Actor,
    window: Duration,
) -> Result<ParentDashboard, AppError> {
    let guardian_id = actor.user_id;
    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    waitlist_service::expire_and_promote_for_guardian(&mut tx, guardian_id, Utc::now(), window)
        .await?;

    let children = children_repo::list_children_for_guardian(&mut tx, guardian_id).await?;
    let registrations = registrations_repo::list_for_guardian(&mut tx, guardian_id).await?;
    let waitlist = waitlist_repo::list_open_for_guardian(&mut tx, guardian_id).await?;
    let charges = billing_repo::list_charges_for_guardian(&mut tx, guardian_id).await?;
    let payments = billing_repo::list_payments_for_guardian(&mut tx, guardian_id).await?;
    let outstanding_forms = forms_repo::list_outstanding_for_guardian(&mut tx, guardian_id).await?;
    let incidents = incidents_repo::list_for_guardian(&mut tx, guardian_id).await?;
    tx.commit().await?;

    Ok(ParentDashboard {
        children,
        registrations,
        waitlist,
        balance: billing_service::compute_balance(&charges, &payments),
        outstanding_forms,
        incidents,
    })
}

/// Rosters for every session running on `date`, plus open incidents.
pub async fn staff_dashboard(
    pool: &PgPool,
    actor: &Actor,
    date: Option<NaiveDate>,
) -> Result<StaffDashboard, AppError> {
    actor.require(Permission::AttendanceWrite)?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move {
            let running = camp_sessions_repo::list_sessions_running_on(conn, date).await?;
            let mut sessions = Vec::with_capacity(running.len());
            for session in running {
                sessions.push(attendance_service::roster_on(conn, session, date).await?);
            }
            let open_incidents = incidents_repo::list_open(conn).await?;
            Ok(StaffDashboard {
                date,
                sessions,
                open_incidents,
            })
        })
    })
    .await
}

pub async fn admin_dashboard(
    pool: &PgPool,
    actor: &Actor,
    window: Duration,
) -> Result<AdminDashboard, AppError> {
    actor.require(Permission::Admin)?;
    let organization = users_repo::load_organization(pool, actor.organization_id)
        .await?
        .ok_or(AppError::NotFound("organization"))?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    waitlist_service::expire_and_promote_all(&mut tx, Utc::now(), window).await?;

    let sessions = camp_sessions_repo::list_occupancy(&mut tx, None)
        .await?
        .into_iter()
        .map(SessionListing::from)
        .collect();
    let billing = billing_service::organization_summary(&mut tx).await?;
    let recent_events = events_repo::list_recent(&mut tx, RECENT_EVENTS).await?;
    tx.commit().await?;

    Ok(AdminDashboard {
        organization,
        sessions,
        billing,
        recent_events,
    })
}
