use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::incidents_repo::{self, NewIncident};
use crate::database::tenant_context::{self, with_organization_context};
use crate::database::{camp_sessions_repo, children_repo};
use crate::error::AppError;
use crate::forms::FieldError;
use crate::models::{IncidentRow, Severity};
use crate::permissions::{Actor, Permission};
use crate::services::events_service;

#[derive(Debug, Clone, Deserialize)]
pub struct IncidentInput {
    pub child_id: Uuid,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub severity: Severity,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub action_taken: Option<String>,
    /// Defaults to the time of reporting.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveInput {
    #[serde(default)]
    pub action_taken: Option<String>,
}

pub async fn report(
    pool: &PgPool,
    actor: &Actor,
    input: IncidentInput,
) -> Result<IncidentRow, AppError> {
    actor.require(Permission::IncidentsWrite)?;
    let now = Utc::now();
    let occurred_at = input.occurred_at.unwrap_or(now);

    let mut errors = Vec::new();
    if input.category.trim().is_empty() {
        errors.push(FieldError::new("category", "Category is required"));
    }
    if input.description.trim().is_empty() {
        errors.push(FieldError::new("description", "Description is required"));
    }
    if occurred_at > now {
        errors.push(FieldError::new("occurred_at", "Incident time cannot be in the future"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    children_repo::load_child(&mut tx, input.child_id)
        .await?
        .ok_or(AppError::NotFound("child"))?;
    if let Some(session_id) = input.session_id {
        camp_sessions_repo::load_session(&mut tx, session_id)
            .await?
            .ok_or(AppError::NotFound("session"))?;
    }

    let incident = incidents_repo::insert_incident(
        &mut tx,
        NewIncident {
            id: Uuid::new_v4(),
            organization_id: actor.organization_id,
            child_id: input.child_id,
            session_id: input.session_id,
            reported_by: actor.user_id,
            severity: input.severity.as_str(),
            category: input.category.trim(),
            description: input.description.trim(),
            action_taken: input.action_taken.as_deref().map(str::trim).filter(|a| !a.is_empty()),
            occurred_at,
        },
    )
    .await?;
    events_service::record(
        &mut tx,
        actor,
        "incident.reported",
        "incident",
        incident.id,
        json!({ "child_id": incident.child_id, "severity": incident.severity }),
    )
    .await?;
    tx.commit().await?;

    if input.severity >= Severity::High {
        warn!(
            incident_id = %incident.id,
            child_id = %incident.child_id,
            severity = input.severity.as_str(),
            "serious incident reported"
        );
    } else {
        info!(incident_id = %incident.id, "incident reported");
    }
    Ok(incident)
}

pub async fn mark_guardian_notified(
    pool: &PgPool,
    actor: &Actor,
    incident_id: Uuid,
) -> Result<IncidentRow, AppError> {
    actor.require(Permission::IncidentsWrite)?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let incident = incidents_repo::mark_guardian_notified(&mut tx, incident_id, Utc::now())
        .await?
        .ok_or(AppError::NotFound("incident"))?;
    events_service::record(
        &mut tx,
        actor,
        "incident.guardian_notified",
        "incident",
        incident.id,
        json!({}),
    )
    .await?;
    tx.commit().await?;
    Ok(incident)
}

pub async fn resolve(
    pool: &PgPool,
    actor: &Actor,
    incident_id: Uuid,
    input: ResolveInput,
) -> Result<IncidentRow, AppError> {
    actor.require(Permission::IncidentsWrite)?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let existing = incidents_repo::load_incident(&mut tx, incident_id)
        .await?
        .ok_or(AppError::NotFound("incident"))?;
    if existing.resolved_at.is_some() {
        return Err(AppError::Conflict("incident is already resolved".into()));
    }
    let action_taken = input.action_taken.as_deref().map(str::trim).filter(|a| !a.is_empty());
    let incident =
        incidents_repo::resolve_incident(&mut tx, incident_id, actor.user_id, action_taken, Utc::now())
            .await?
            .ok_or_else(|| AppError::Conflict("incident is already resolved".into()))?;
    events_service::record(&mut tx, actor, "incident.resolved", "incident", incident.id, json!({}))
        .await?;
    tx.commit().await?;
    Ok(incident)
}

/// Staff see open incidents for the organization; parents see every incident
/// involving their own children.
pub async fn list_incidents(pool: &PgPool, actor: &Actor) -> Result<Vec<IncidentRow>, AppError> {
    actor.require(Permission::IncidentsRead)?;
    let actor = *actor;
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move {
            let rows = if actor.role.is_staff() {
                incidents_repo::list_open(conn).await?
            } else {
                incidents_repo::list_for_guardian(conn, actor.user_id).await?
            };
            Ok(rows)
        })
    })
    .await
}
