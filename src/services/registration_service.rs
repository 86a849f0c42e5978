use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::registrations_repo::{self, NewRegistration};
use crate::database::tenant_context::{self, with_organization_context};
use crate::database::waitlist_repo::{self, NewWaitlistEntry};
use crate::database::{camp_sessions_repo, children_repo};
use crate::error::AppError;
use crate::models::waitlist_entries::WAITLIST_OFFERED;
use crate::models::{RegistrationRow, RegistrationSummaryRow, WaitlistEntryRow};
use crate::permissions::{Actor, Permission};
use crate::services::{billing_service, events_service, forms_service, waitlist_service};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub child_id: Uuid,
    pub session_id: Uuid,
    /// Answers for the session's registration form, if it has one.
    #[serde(default)]
    pub answers: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Confirmed { registration: RegistrationRow },
    Waitlisted { entry: WaitlistEntryRow },
}

/// Registers a child for a session: confirmed when a seat is free, otherwise
/// queued at the tail of the waitlist.
pub async fn register(
    pool: &PgPool,
    actor: &Actor,
    input: RegisterInput,
    window: Duration,
) -> Result<RegistrationOutcome, AppError> {
    actor.require(Permission::RegistrationsCreate)?;
    let now = Utc::now();

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let session = camp_sessions_repo::lock_session(&mut tx, input.session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    if !session.is_open() {
        return Err(AppError::Conflict("registration for this session is closed".into()));
    }

    let child = children_repo::load_child(&mut tx, input.child_id)
        .await?
        .ok_or(AppError::NotFound("child"))?;
    if !actor.may_act_for(child.guardian_id) {
        return Err(AppError::NotFound("child"));
    }
    let age = child.age_on(session.starts_on);
    if !session.accepts_age(age) {
        return Err(AppError::BadRequest(format!(
            "{} is {} when the session starts, outside its age range",
            child.first_name, age
        )));
    }

    if registrations_repo::find_active(&mut tx, child.id, session.id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("child is already registered for this session".into()));
    }
    if let Some(open) = waitlist_repo::find_open_for_child(&mut tx, child.id, session.id).await? {
        let message = if open.status == WAITLIST_OFFERED {
            "child already has a seat offer for this session"
        } else {
            "child is already on the waitlist for this session"
        };
        return Err(AppError::Conflict(message.into()));
    }

    let submission = match session.registration_form_id {
        Some(form_id) => {
            let published = forms_service::load_published(&mut tx, form_id)
                .await
                .map_err(|e| match e {
                    AppError::NotFound(_) => {
                        AppError::Conflict("the registration form is not published".into())
                    }
                    other => other,
                })?;
            let answers = input.answers.unwrap_or_default();
            Some(forms_service::submit_on(&mut tx, actor, &published, Some(child.id), &answers).await?)
        }
        None => None,
    };

    // Queue first: children already waiting get freed seats before newcomers.
    waitlist_service::promote(&mut tx, &session, now, window).await?;
    let active = registrations_repo::count_active(&mut tx, session.id).await?;
    let live = waitlist_repo::count_live_offers(&mut tx, session.id, now).await?;
    let seats = waitlist_service::available_seats(session.capacity, active, live);

    let outcome = if seats > 0 {
        let registration = registrations_repo::upsert_confirmed(
            &mut tx,
            NewRegistration {
                id: Uuid::new_v4(),
                organization_id: actor.organization_id,
                child_id: child.id,
                session_id: session.id,
                form_submission_id: submission.as_ref().map(|s| s.id),
                created_by: actor.user_id,
            },
        )
        .await?
        .ok_or_else(|| AppError::Conflict("child is already registered for this session".into()))?;
        billing_service::post_session_fee(&mut tx, actor, &session, &registration).await?;
        events_service::record(
            &mut tx,
            actor,
            "registration.confirmed",
            "registration",
            registration.id,
            json!({ "session_id": session.id, "child_id": child.id }),
        )
        .await?;
        info!(
            registration_id = %registration.id,
            session_id = %session.id,
            child_id = %child.id,
            "registration confirmed"
        );
        RegistrationOutcome::Confirmed { registration }
    } else {
        let entry = waitlist_repo::insert_entry(
            &mut tx,
            NewWaitlistEntry {
                id: Uuid::new_v4(),
                organization_id: actor.organization_id,
                child_id: child.id,
                session_id: session.id,
                created_by: actor.user_id,
            },
        )
        .await?;
        events_service::record(
            &mut tx,
            actor,
            "waitlist.joined",
            "waitlist_entry",
            entry.id,
            json!({ "session_id": session.id, "child_id": child.id, "position": entry.position }),
        )
        .await?;
        info!(
            entry_id = %entry.id,
            session_id = %session.id,
            position = entry.position,
            "session full, child waitlisted"
        );
        RegistrationOutcome::Waitlisted { entry }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Cancels a confirmed registration, voids its charges and offers the seat on.
pub async fn cancel(
    pool: &PgPool,
    actor: &Actor,
    registration_id: Uuid,
    window: Duration,
) -> Result<RegistrationRow, AppError> {
    let now = Utc::now();
    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;

    let registration = registrations_repo::load_registration(&mut tx, registration_id)
        .await?
        .ok_or(AppError::NotFound("registration"))?;
    let session = camp_sessions_repo::lock_session(&mut tx, registration.session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    let child = children_repo::load_child(&mut tx, registration.child_id)
        .await?
        .ok_or(AppError::NotFound("child"))?;
    if actor.role.is_staff() {
        actor.require(Permission::RegistrationsManage)?;
    } else if actor.user_id != child.guardian_id {
        return Err(AppError::NotFound("registration"));
    }

    let cancelled = registrations_repo::cancel_registration(&mut tx, registration.id)
        .await?
        .ok_or_else(|| AppError::Conflict("registration is not active".into()))?;
    let voided = billing_service::void_registration_charges(&mut tx, cancelled.id).await?;
    events_service::record(
        &mut tx,
        actor,
        "registration.cancelled",
        "registration",
        cancelled.id,
        json!({ "session_id": session.id, "voided_charges": voided }),
    )
    .await?;

    let report = waitlist_service::promote(&mut tx, &session, now, window).await?;
    tx.commit().await?;

    info!(
        registration_id = %cancelled.id,
        session_id = %session.id,
        offers_made = report.offered.len(),
        "registration cancelled"
    );
    Ok(cancelled)
}

pub async fn list_for_guardian(
    pool: &PgPool,
    actor: &Actor,
) -> Result<Vec<RegistrationSummaryRow>, AppError> {
    let guardian_id = actor.user_id;
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move { Ok(registrations_repo::list_for_guardian(conn, guardian_id).await?) })
    })
    .await
}

pub async fn list_for_session(
    pool: &PgPool,
    actor: &Actor,
    session_id: Uuid,
) -> Result<Vec<RegistrationSummaryRow>, AppError> {
    actor.require(Permission::ChildrenReadAll)?;
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move { Ok(registrations_repo::list_for_session(conn, session_id).await?) })
    })
    .await
}
