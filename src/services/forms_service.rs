use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::database::forms_repo::{self, NewFormDefinition, NewSubmission};
use crate::database::tenant_context::{self, with_organization_context};
use crate::database::children_repo;
use crate::error::AppError;
use crate::forms::{FieldDefinition, FieldError, FormSchema};
use crate::models::forms::{FORM_ARCHIVED, FORM_PUBLISHED};
use crate::models::{FormDefinitionRow, FormKind, FormSubmissionRow, FormVersionRow};
use crate::permissions::{Actor, Permission};
use crate::services::events_service;

const MAX_SUBMISSIONS: i64 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct FormInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub form_kind: FormKind,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl FormInput {
    fn check(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation(vec![FieldError::new(
                "name",
                "Name is required",
            )]));
        }
        FormSchema::compile(&self.fields)?;
        Ok(())
    }
}

/// A published snapshot ready to render or validate against.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedForm {
    pub form: FormDefinitionRow,
    pub version: FormVersionRow,
    #[serde(skip)]
    pub schema: FormSchema,
}

impl PublishedForm {
    pub fn kind(&self) -> Option<FormKind> {
        parse_kind(&self.form.form_kind)
    }
}

pub fn parse_kind(raw: &str) -> Option<FormKind> {
    serde_json::from_value(Value::String(raw.to_string())).ok()
}

pub async fn create_form(
    pool: &PgPool,
    actor: &Actor,
    input: FormInput,
) -> Result<FormDefinitionRow, AppError> {
    actor.require(Permission::FormsManage)?;
    input.check()?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let form = forms_repo::insert_definition(
        &mut tx,
        NewFormDefinition {
            id: Uuid::new_v4(),
            organization_id: actor.organization_id,
            name: input.name.trim(),
            description: input.description.as_deref(),
            form_kind: input.form_kind.as_str(),
            fields: &input.fields,
            created_by: actor.user_id,
        },
    )
    .await?;
    events_service::record(
        &mut tx,
        actor,
        "form.created",
        "form",
        form.id,
        json!({ "form_kind": form.form_kind }),
    )
    .await?;
    tx.commit().await?;
    Ok(form)
}

/// Archived forms are frozen; the kind is fixed once a version exists.
fn check_draft_edit(form: &FormDefinitionRow, kind: FormKind) -> Result<(), AppError> {
    if form.status == FORM_ARCHIVED {
        return Err(AppError::Conflict("archived forms cannot be edited".into()));
    }
    if form.current_version > 0 && parse_kind(&form.form_kind) != Some(kind) {
        return Err(AppError::Conflict(
            "the kind of a published form cannot change".into(),
        ));
    }
    Ok(())
}

/// Edits only the draft; published snapshots never change.
pub async fn update_draft(
    pool: &PgPool,
    actor: &Actor,
    form_id: Uuid,
    input: FormInput,
) -> Result<FormDefinitionRow, AppError> {
    actor.require(Permission::FormsManage)?;
    input.check()?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let current = forms_repo::lock_definition(&mut tx, form_id)
        .await?
        .ok_or(AppError::NotFound("form"))?;
    check_draft_edit(&current, input.form_kind)?;

    let form = forms_repo::update_draft(
        &mut tx,
        current.id,
        input.name.trim(),
        input.description.as_deref(),
        input.form_kind.as_str(),
        &input.fields,
    )
    .await?;
    events_service::record(
        &mut tx,
        actor,
        "form.draft_updated",
        "form",
        form.id,
        json!({ "form_kind": form.form_kind }),
    )
    .await?;
    tx.commit().await?;
    Ok(form)
}

/// Compiles the draft and stores it as the next immutable version.
pub async fn publish(
    pool: &PgPool,
    actor: &Actor,
    form_id: Uuid,
) -> Result<FormVersionRow, AppError> {
    actor.require(Permission::FormsManage)?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let form = forms_repo::lock_definition(&mut tx, form_id)
        .await?
        .ok_or(AppError::NotFound("form"))?;
    if form.status == FORM_ARCHIVED {
        return Err(AppError::Conflict("archived forms cannot be published".into()));
    }
    FormSchema::compile(&form.fields.0)?;

    let next = form.current_version + 1;
    let version = forms_repo::insert_version(&mut tx, Uuid::new_v4(), &form, next, actor.user_id).await?;
    forms_repo::set_status(&mut tx, form.id, FORM_PUBLISHED, next).await?;
    events_service::record(
        &mut tx,
        actor,
        "form.published",
        "form",
        form.id,
        json!({ "version": next }),
    )
    .await?;
    tx.commit().await?;

    info!(form_id = %form.id, version = next, "form published");
    Ok(version)
}

pub async fn archive(
    pool: &PgPool,
    actor: &Actor,
    form_id: Uuid,
) -> Result<FormDefinitionRow, AppError> {
    actor.require(Permission::FormsManage)?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let form = forms_repo::lock_definition(&mut tx, form_id)
        .await?
        .ok_or(AppError::NotFound("form"))?;
    let form = forms_repo::set_status(&mut tx, form.id, FORM_ARCHIVED, form.current_version).await?;
    events_service::record(&mut tx, actor, "form.archived", "form", form.id, json!({})).await?;
    tx.commit().await?;
    Ok(form)
}

pub async fn list_forms(pool: &PgPool, actor: &Actor) -> Result<Vec<FormDefinitionRow>, AppError> {
    actor.require(Permission::FormsManage)?;
    with_organization_context(pool, actor.organization_id, |conn| {
        Box::pin(async move { Ok(forms_repo::list_definitions(conn).await?) })
    })
    .await
}

/// Latest published snapshot of a form, compiled.
pub async fn load_published(
    conn: &mut PgConnection,
    form_id: Uuid,
) -> Result<PublishedForm, AppError> {
    let form = forms_repo::load_definition(conn, form_id)
        .await?
        .ok_or(AppError::NotFound("form"))?;
    if form.status != FORM_PUBLISHED || form.current_version < 1 {
        return Err(AppError::NotFound("form"));
    }
    let version = forms_repo::load_version(conn, form.id, form.current_version)
        .await?
        .ok_or(AppError::NotFound("form version"))?;
    let schema = FormSchema::compile(&version.fields.0)?;
    Ok(PublishedForm {
        form,
        version,
        schema,
    })
}

pub async fn published_form(
    pool: &PgPool,
    actor: &Actor,
    form_id: Uuid,
) -> Result<PublishedForm, AppError> {
    actor.require(Permission::FormsSubmit)?;
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move { load_published(conn, form_id).await })
    })
    .await
}

/// Validates `answers` against the snapshot and stores the submission.
pub async fn submit_on(
    conn: &mut PgConnection,
    actor: &Actor,
    published: &PublishedForm,
    child_id: Option<Uuid>,
    answers: &Map<String, Value>,
) -> Result<FormSubmissionRow, AppError> {
    let normalized = published
        .schema
        .validate(answers)
        .map_err(AppError::Validation)?;
    let answers = Value::Object(normalized);
    let submission = forms_repo::insert_submission(
        conn,
        NewSubmission {
            id: Uuid::new_v4(),
            organization_id: actor.organization_id,
            version: &published.version,
            child_id,
            submitted_by: actor.user_id,
            answers: &answers,
        },
    )
    .await?;
    events_service::record(
        conn,
        actor,
        "form.submitted",
        "form_submission",
        submission.id,
        json!({
            "form_id": published.form.id,
            "version": published.version.version,
            "child_id": child_id,
        }),
    )
    .await?;
    Ok(submission)
}

pub async fn submit(
    pool: &PgPool,
    actor: &Actor,
    form_id: Uuid,
    child_id: Option<Uuid>,
    answers: Map<String, Value>,
) -> Result<FormSubmissionRow, AppError> {
    actor.require(Permission::FormsSubmit)?;

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let published = load_published(&mut tx, form_id).await?;

    if published.kind().is_some_and(FormKind::required_per_child) && child_id.is_none() {
        return Err(AppError::Validation(vec![FieldError::new(
            "child_id",
            "Choose the child this form is for",
        )]));
    }
    if let Some(child_id) = child_id {
        let child = children_repo::load_child(&mut tx, child_id)
            .await?
            .ok_or(AppError::NotFound("child"))?;
        if !actor.may_act_for(child.guardian_id) {
            return Err(AppError::NotFound("child"));
        }
    }

    let submission = submit_on(&mut tx, actor, &published, child_id, &answers).await?;
    tx.commit().await?;

    info!(
        submission_id = %submission.id,
        form_id = %form_id,
        version = submission.version,
        "form submitted"
    );
    Ok(submission)
}

pub async fn list_submissions(
    pool: &PgPool,
    actor: &Actor,
    form_id: Uuid,
    limit: Option<i64>,
) -> Result<Vec<FormSubmissionRow>, AppError> {
    actor.require(Permission::FormsManage)?;
    let limit = limit.unwrap_or(100).clamp(1, MAX_SUBMISSIONS);
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move { Ok(forms_repo::list_submissions(conn, form_id, limit).await?) })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FieldType;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("consent"), Some(FormKind::Consent));
        assert_eq!(parse_kind("Consent"), None);
    }

    #[test]
    fn test_input_check_rejects_bad_schema() {
        let input = FormInput {
            name: "Medical".into(),
            description: None,
            form_kind: FormKind::Medical,
            fields: vec![
                FieldDefinition::new("allergy", "Allergy", FieldType::Text),
                FieldDefinition::new("allergy", "Allergy again", FieldType::Text),
            ],
        };
        assert!(matches!(input.check(), Err(AppError::Schema(_))));
    }

    fn stored(status: &str, current_version: i32, form_kind: &str) -> FormDefinitionRow {
        let now = chrono::Utc::now();
        FormDefinitionRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Medical".into(),
            description: None,
            form_kind: form_kind.into(),
            fields: sqlx::types::Json(Vec::new()),
            status: status.into(),
            current_version,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_draft_edit_rules() {
        let archived = stored(FORM_ARCHIVED, 2, "medical");
        assert!(matches!(
            check_draft_edit(&archived, FormKind::Medical),
            Err(AppError::Conflict(_))
        ));

        // Never published: the kind is still free to change.
        let draft = stored("draft", 0, "custom");
        assert!(check_draft_edit(&draft, FormKind::Consent).is_ok());

        let published = stored(FORM_PUBLISHED, 1, "consent");
        assert!(check_draft_edit(&published, FormKind::Consent).is_ok());
        assert!(matches!(
            check_draft_edit(&published, FormKind::Medical),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_input_check_requires_name() {
        let input = FormInput {
            name: "  ".into(),
            description: None,
            form_kind: FormKind::Custom,
            fields: Vec::new(),
        };
        assert!(matches!(input.check(), Err(AppError::Validation(_))));
    }
}
