use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::children_repo::{self, ChildUpdate, NewChild};
use crate::database::tenant_context::{self, with_organization_context};
use crate::database::users_repo;
use crate::error::AppError;
use crate::forms::FieldError;
use crate::models::{ChildRow, Role};
use crate::permissions::{Actor, Permission};
use crate::services::events_service;

#[derive(Debug, Clone, Deserialize)]
pub struct ChildInput {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub medical_notes: Option<String>,
    /// Admins may file a child under another guardian; ignored for parents.
    #[serde(default)]
    pub guardian_id: Option<Uuid>,
}

impl ChildInput {
    fn check(&self, today: NaiveDate) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.first_name.trim().is_empty() {
            errors.push(FieldError::new("first_name", "First name is required"));
        }
        if self.last_name.trim().is_empty() {
            errors.push(FieldError::new("last_name", "Last name is required"));
        }
        if self.date_of_birth > today {
            errors.push(FieldError::new(
                "date_of_birth",
                "Date of birth cannot be in the future",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Admins never own children, so they must name the guardian explicitly.
/// Returns the guardian that still has to be checked against the directory.
fn guardian_to_verify(actor: &Actor, requested: Option<Uuid>) -> Result<Option<Uuid>, AppError> {
    match (actor.role, requested) {
        (Role::Admin, Some(guardian_id)) => Ok(Some(guardian_id)),
        (Role::Admin, None) => Err(AppError::BadRequest(
            "guardian_id is required when an admin adds a child".into(),
        )),
        _ => Ok(None),
    }
}

pub async fn create_child(
    pool: &PgPool,
    actor: &Actor,
    input: ChildInput,
) -> Result<ChildRow, AppError> {
    actor.require(Permission::ChildrenWrite)?;
    input.check(Utc::now().date_naive())?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;

    let guardian_id = match guardian_to_verify(actor, input.guardian_id)? {
        Some(guardian_id) => {
            let guardian =
                users_repo::load_org_user(&mut tx, actor.organization_id, guardian_id)
                    .await?
                    .ok_or(AppError::NotFound("guardian"))?;
            if Role::parse(&guardian.role) != Some(Role::Parent) {
                return Err(AppError::BadRequest("guardian must be a parent".into()));
            }
            guardian.id
        }
        None => actor.user_id,
    };

    let child = children_repo::insert_child(
        &mut tx,
        NewChild {
            id: Uuid::new_v4(),
            organization_id: actor.organization_id,
            guardian_id,
            first_name: input.first_name.trim(),
            last_name: input.last_name.trim(),
            date_of_birth: input.date_of_birth,
            allergies: non_blank(&input.allergies),
            medical_notes: non_blank(&input.medical_notes),
        },
    )
    .await?;

    events_service::record(
        &mut tx,
        actor,
        "child.created",
        "child",
        child.id,
        json!({ "guardian_id": guardian_id }),
    )
    .await?;
    tx.commit().await?;

    info!(child_id = %child.id, %guardian_id, "child created");
    Ok(child)
}

pub async fn update_child(
    pool: &PgPool,
    actor: &Actor,
    child_id: Uuid,
    input: ChildInput,
) -> Result<ChildRow, AppError> {
    actor.require(Permission::ChildrenWrite)?;
    input.check(Utc::now().date_naive())?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let existing = children_repo::load_child(&mut tx, child_id)
        .await?
        .ok_or(AppError::NotFound("child"))?;
    if !actor.may_act_for(existing.guardian_id) {
        return Err(AppError::NotFound("child"));
    }

    let child = children_repo::update_child(
        &mut tx,
        child_id,
        ChildUpdate {
            first_name: input.first_name.trim(),
            last_name: input.last_name.trim(),
            date_of_birth: input.date_of_birth,
            allergies: non_blank(&input.allergies),
            medical_notes: non_blank(&input.medical_notes),
        },
    )
    .await?
    .ok_or(AppError::NotFound("child"))?;

    events_service::record(&mut tx, actor, "child.updated", "child", child.id, json!({})).await?;
    tx.commit().await?;
    Ok(child)
}

/// Parents see their own children; staff and admins see the organization.
pub async fn list_children(pool: &PgPool, actor: &Actor) -> Result<Vec<ChildRow>, AppError> {
    let actor = *actor;
    let see_all = actor.can(Permission::ChildrenReadAll);
    if !see_all {
        actor.require(Permission::ChildrenReadOwn)?;
    }
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move {
            let rows = if see_all {
                children_repo::list_children(conn).await?
            } else {
                children_repo::list_children_for_guardian(conn, actor.user_id).await?
            };
            Ok(rows)
        })
    })
    .await
}

pub async fn load_child(pool: &PgPool, actor: &Actor, child_id: Uuid) -> Result<ChildRow, AppError> {
    let actor = *actor;
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move {
            let child = children_repo::load_child(conn, child_id)
                .await?
                .ok_or(AppError::NotFound("child"))?;
            if !actor.may_act_for(child.guardian_id) {
                return Err(AppError::NotFound("child"));
            }
            Ok(child)
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(first: &str, dob: NaiveDate) -> ChildInput {
        ChildInput {
            first_name: first.to_string(),
            last_name: "Jansen".to_string(),
            date_of_birth: dob,
            allergies: Some("  ".to_string()),
            medical_notes: None,
            guardian_id: None,
        }
    }

    #[test]
    fn test_check_collects_every_problem() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let future = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        match input(" ", future).check(today) {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["first_name", "date_of_birth"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_blank_optional_text_is_dropped() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let child = input("Sam", NaiveDate::from_ymd_opt(2016, 3, 4).unwrap());
        assert!(child.check(today).is_ok());
        assert_eq!(non_blank(&child.allergies), None);
        assert_eq!(non_blank(&Some(" peanuts ".into())), Some("peanuts"));
    }

    #[test]
    fn test_admin_must_name_the_guardian() {
        let org = Uuid::new_v4();
        let admin = Actor {
            user_id: Uuid::new_v4(),
            organization_id: org,
            role: Role::Admin,
        };
        let parent = Actor {
            user_id: Uuid::new_v4(),
            organization_id: org,
            role: Role::Parent,
        };
        let guardian = Uuid::new_v4();

        assert!(matches!(
            guardian_to_verify(&admin, None),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(guardian_to_verify(&admin, Some(guardian)).unwrap(), Some(guardian));
        // Parents always file under themselves.
        assert_eq!(guardian_to_verify(&parent, Some(guardian)).unwrap(), None);
        assert_eq!(guardian_to_verify(&parent, None).unwrap(), None);
    }
}
