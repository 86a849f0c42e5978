use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::camp_sessions_repo::{self, SessionFields};
use crate::database::tenant_context::{self, with_organization_context};
use crate::error::AppError;
use crate::forms::FieldError;
use crate::models::camp_sessions::{SESSION_CLOSED, SESSION_OPEN};
use crate::models::{CampSessionRow, SessionOccupancyRow};
use crate::permissions::{Actor, Permission};
use crate::services::{events_service, waitlist_service};

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub price_cents: i64,
    pub capacity: i32,
    #[serde(default)]
    pub min_age: Option<i32>,
    #[serde(default)]
    pub max_age: Option<i32>,
    #[serde(default)]
    pub registration_form_id: Option<Uuid>,
}

impl SessionInput {
    fn check(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "Name is required"));
        }
        if self.ends_on < self.starts_on {
            errors.push(FieldError::new("ends_on", "End date must not be before the start date"));
        }
        if self.price_cents < 0 {
            errors.push(FieldError::new("price_cents", "Price cannot be negative"));
        }
        if self.capacity < 0 {
            errors.push(FieldError::new("capacity", "Capacity cannot be negative"));
        }
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                errors.push(FieldError::new("max_age", "Maximum age must not be below the minimum"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    fn fields(&self) -> SessionFields<'_> {
        SessionFields {
            name: self.name.trim(),
            description: self.description.as_deref(),
            starts_on: self.starts_on,
            ends_on: self.ends_on,
            price_cents: self.price_cents,
            capacity: self.capacity,
            min_age: self.min_age,
            max_age: self.max_age,
            registration_form_id: self.registration_form_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListing {
    #[serde(flatten)]
    pub session: SessionOccupancyRow,
    pub seats_left: i64,
}

impl From<SessionOccupancyRow> for SessionListing {
    fn from(session: SessionOccupancyRow) -> Self {
        let seats_left =
            waitlist_service::available_seats(session.capacity, session.enrolled, session.offered);
        Self {
            session,
            seats_left,
        }
    }
}

pub async fn create_session(
    pool: &PgPool,
    actor: &Actor,
    input: SessionInput,
) -> Result<CampSessionRow, AppError> {
    actor.require(Permission::SessionsManage)?;
    input.check()?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let session = camp_sessions_repo::insert_session(
        &mut tx,
        Uuid::new_v4(),
        actor.organization_id,
        input.fields(),
    )
    .await?;
    events_service::record(
        &mut tx,
        actor,
        "session.created",
        "session",
        session.id,
        json!({ "capacity": session.capacity, "price_cents": session.price_cents }),
    )
    .await?;
    tx.commit().await?;

    info!(session_id = %session.id, name = %session.name, "camp session created");
    Ok(session)
}

/// Updates a session. Raising the capacity offers the new seats to the waitlist.
pub async fn update_session(
    pool: &PgPool,
    actor: &Actor,
    session_id: Uuid,
    input: SessionInput,
    window: Duration,
) -> Result<CampSessionRow, AppError> {
    actor.require(Permission::SessionsManage)?;
    input.check()?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    camp_sessions_repo::lock_session(&mut tx, session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    let session = camp_sessions_repo::update_session(&mut tx, session_id, input.fields())
        .await?
        .ok_or(AppError::NotFound("session"))?;
    events_service::record(&mut tx, actor, "session.updated", "session", session.id, json!({}))
        .await?;
    waitlist_service::promote(&mut tx, &session, Utc::now(), window).await?;
    tx.commit().await?;
    Ok(session)
}

async fn set_status(
    pool: &PgPool,
    actor: &Actor,
    session_id: Uuid,
    status: &'static str,
    window: Duration,
) -> Result<CampSessionRow, AppError> {
    actor.require(Permission::SessionsManage)?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    camp_sessions_repo::lock_session(&mut tx, session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    let session = camp_sessions_repo::set_session_status(&mut tx, session_id, status)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    events_service::record(
        &mut tx,
        actor,
        "session.status_changed",
        "session",
        session.id,
        json!({ "status": status }),
    )
    .await?;
    if session.is_open() {
        waitlist_service::promote(&mut tx, &session, Utc::now(), window).await?;
    }
    tx.commit().await?;

    info!(session_id = %session.id, status, "camp session status changed");
    Ok(session)
}

pub async fn open_session(
    pool: &PgPool,
    actor: &Actor,
    session_id: Uuid,
    window: Duration,
) -> Result<CampSessionRow, AppError> {
    set_status(pool, actor, session_id, SESSION_OPEN, window).await
}

pub async fn close_session(
    pool: &PgPool,
    actor: &Actor,
    session_id: Uuid,
    window: Duration,
) -> Result<CampSessionRow, AppError> {
    set_status(pool, actor, session_id, SESSION_CLOSED, window).await
}

/// Parents only see open sessions; staff and admins see every status.
pub async fn list_sessions(pool: &PgPool, actor: &Actor) -> Result<Vec<SessionListing>, AppError> {
    actor.require(Permission::SessionsRead)?;
    let status = if actor.role.is_staff() { None } else { Some(SESSION_OPEN) };
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move {
            let rows = camp_sessions_repo::list_occupancy(conn, status).await?;
            Ok(rows.into_iter().map(SessionListing::from).collect())
        })
    })
    .await
}

pub async fn load_session(
    pool: &PgPool,
    actor: &Actor,
    session_id: Uuid,
) -> Result<CampSessionRow, AppError> {
    actor.require(Permission::SessionsRead)?;
    let staff = actor.role.is_staff();
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move {
            let session = camp_sessions_repo::load_session(conn, session_id)
                .await?
                .ok_or(AppError::NotFound("session"))?;
            if !staff && !session.is_open() {
                return Err(AppError::NotFound("session"));
            }
            Ok(session)
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SessionInput {
        SessionInput {
            name: "Summer week 1".into(),
            description: None,
            starts_on: NaiveDate::from_ymd_opt(2025, 7, 7).unwrap(),
            ends_on: NaiveDate::from_ymd_opt(2025, 7, 11).unwrap(),
            price_cents: 27_500,
            capacity: 24,
            min_age: Some(7),
            max_age: Some(12),
            registration_form_id: None,
        }
    }

    #[test]
    fn test_valid_input_passes() {
        assert!(input().check().is_ok());
    }

    #[test]
    fn test_invalid_input_reports_each_field() {
        let mut bad = input();
        bad.ends_on = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        bad.capacity = -1;
        bad.min_age = Some(14);
        match bad.check() {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["ends_on", "capacity", "max_age"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_listing_seats_left() {
        let listing = SessionListing::from(SessionOccupancyRow {
            id: Uuid::nil(),
            name: "Week 2".into(),
            starts_on: NaiveDate::from_ymd_opt(2025, 7, 14).unwrap(),
            ends_on: NaiveDate::from_ymd_opt(2025, 7, 18).unwrap(),
            price_cents: 0,
            capacity: 10,
            status: SESSION_OPEN.into(),
            enrolled: 7,
            waiting: 4,
            offered: 2,
        });
        assert_eq!(listing.seats_left, 1);
    }
}
