use std::collections::HashMap;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{ActionResult, AppError};
use crate::forms::{FieldDefinition, FieldError, FieldType};
use crate::models::{FormDefinitionRow, FormSubmissionRow, FormVersionRow};
use crate::services::children_service;
use crate::services::forms_service::{self, FormInput, PublishedForm};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::routes::{sanitize_return_to, with_notice};
use crate::AppState;

pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub struct FieldView {
    pub key: String,
    pub label: String,
    pub help_text: String,
    pub placeholder: String,
    pub required: bool,
    pub input_type: &'static str,
    pub is_heading: bool,
    pub is_textarea: bool,
    pub is_select: bool,
    pub is_radio: bool,
    pub is_multi: bool,
    pub is_checkbox: bool,
    pub value: String,
    pub checked: bool,
    pub options: Vec<OptionView>,
    pub error: String,
}

pub struct ChildChoice {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "form.html")]
pub struct FormPageTemplate {
    pub form_id: Uuid,
    pub title: String,
    pub description: String,
    pub version: i32,
    pub fields: Vec<FieldView>,
    pub children: Vec<ChildChoice>,
    pub child_required: bool,
    pub child_error: String,
    pub return_to: String,
    pub notice: String,
    pub has_errors: bool,
}

fn input_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Email => "email",
        FieldType::Phone => "tel",
        FieldType::Number => "number",
        FieldType::Date => "date",
        _ => "text",
    }
}

fn field_view(
    def: &FieldDefinition,
    values: &HashMap<String, Vec<String>>,
    errors: &[FieldError],
) -> FieldView {
    let current = values.get(&def.key).cloned().unwrap_or_default();
    let first = current.first().cloned().unwrap_or_default();
    FieldView {
        key: def.key.clone(),
        label: def.label.clone(),
        help_text: def.help_text.clone().unwrap_or_default(),
        placeholder: def.placeholder.clone().unwrap_or_default(),
        required: def.required,
        input_type: input_type(def.field_type),
        is_heading: def.field_type == FieldType::Heading,
        is_textarea: def.field_type == FieldType::Textarea,
        is_select: def.field_type == FieldType::Select,
        is_radio: def.field_type == FieldType::Radio,
        is_multi: def.field_type == FieldType::MultiSelect,
        is_checkbox: def.field_type == FieldType::Checkbox,
        checked: matches!(first.as_str(), "on" | "true" | "1"),
        options: def
            .options
            .iter()
            .map(|o| OptionView {
                value: o.value.clone(),
                label: o.label.clone(),
                selected: current.contains(&o.value),
            })
            .collect(),
        value: first,
        error: errors
            .iter()
            .find(|e| e.field == def.key)
            .map(|e| e.message.clone())
            .unwrap_or_default(),
    }
}

struct PageInput<'a> {
    values: HashMap<String, Vec<String>>,
    errors: &'a [FieldError],
    child_id: Option<Uuid>,
    return_to: Option<&'a str>,
    notice: &'a str,
}

async fn render_form_page(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    published: &PublishedForm,
    page: PageInput<'_>,
) -> Result<Html<String>, AppError> {
    let children = children_service::list_children(&state.pool, &auth_user.actor()).await?;
    let child_required = published.kind().is_some_and(|k| k.required_per_child());
    let child_error = page
        .errors
        .iter()
        .find(|e| e.field == "child_id")
        .map(|e| e.message.clone())
        .unwrap_or_default();

    let template = FormPageTemplate {
        form_id: published.form.id,
        title: published.form.name.clone(),
        description: published.form.description.clone().unwrap_or_default(),
        version: published.version.version,
        fields: published
            .schema
            .definitions()
            .map(|def| field_view(def, &page.values, page.errors))
            .collect(),
        children: children
            .iter()
            .map(|c| ChildChoice {
                id: c.id.to_string(),
                name: c.display_name(),
                selected: Some(c.id) == page.child_id,
            })
            .collect(),
        child_required,
        child_error,
        return_to: page
            .return_to
            .and_then(sanitize_return_to)
            .unwrap_or("")
            .to_string(),
        notice: page.notice.to_string(),
        has_errors: !page.errors.is_empty(),
    };
    Ok(Html(template.render()?))
}

#[derive(Debug, Deserialize, Default)]
pub struct FormPageQuery {
    pub child_id: Option<Uuid>,
    pub return_to: Option<String>,
    pub notice: Option<String>,
}

pub async fn form_page_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(form_id): Path<Uuid>,
    Query(query): Query<FormPageQuery>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let published = forms_service::published_form(&state.pool, &auth_user.actor(), form_id).await?;
    let notice = match query.notice.as_deref() {
        Some("form_submitted") => "Form received. Thank you.",
        _ => "",
    };
    render_form_page(
        &state,
        &auth_user,
        &published,
        PageInput {
            values: HashMap::new(),
            errors: &[],
            child_id: query.child_id,
            return_to: query.return_to.as_deref(),
            notice,
        },
    )
    .await
}

/// Urlencoded submission from the rendered form page. Validation errors
/// re-render the page with the entered values.
pub async fn submit_form_page_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(form_id): Path<Uuid>,
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let actor = auth_user.actor();
    let published = forms_service::published_form(&state.pool, &actor, form_id).await?;

    let mut values: HashMap<String, Vec<String>> = HashMap::new();
    let mut child_id = None;
    let mut return_to = None;
    for (key, value) in &pairs {
        match key.as_str() {
            "child_id" => child_id = Uuid::parse_str(value).ok(),
            "return_to" => return_to = Some(value.clone()),
            _ => values.entry(key.clone()).or_default().push(value.clone()),
        }
    }

    let answers = published.schema.answers_from_pairs(&pairs);
    match forms_service::submit(&state.pool, &actor, form_id, child_id, answers).await {
        Ok(_) => {
            let target = return_to
                .as_deref()
                .and_then(sanitize_return_to)
                .unwrap_or("/dashboard");
            Ok(Redirect::to(&with_notice(target, "form_submitted")).into_response())
        }
        Err(AppError::Validation(errors)) => {
            warn!(%form_id, errors = errors.len(), "form submission rejected");
            let page = render_form_page(
                &state,
                &auth_user,
                &published,
                PageInput {
                    values,
                    errors: &errors,
                    child_id,
                    return_to: return_to.as_deref(),
                    notice: "",
                },
            )
            .await?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn list_forms_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<ActionResult<Vec<FormDefinitionRow>>, AppError> {
    let rows = forms_service::list_forms(&state.pool, &auth_user.actor()).await?;
    Ok(ActionResult::ok(rows))
}

pub async fn create_form_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Json(input): Json<FormInput>,
) -> Result<ActionResult<FormDefinitionRow>, AppError> {
    let form = forms_service::create_form(&state.pool, &auth_user.actor(), input).await?;
    Ok(ActionResult::ok(form))
}

pub async fn update_form_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(form_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(input): Json<FormInput>,
) -> Result<ActionResult<FormDefinitionRow>, AppError> {
    let form = forms_service::update_draft(&state.pool, &auth_user.actor(), form_id, input).await?;
    Ok(ActionResult::ok(form))
}

pub async fn publish_form_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(form_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<FormVersionRow>, AppError> {
    let version = forms_service::publish(&state.pool, &auth_user.actor(), form_id).await?;
    Ok(ActionResult::ok(version))
}

pub async fn archive_form_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(form_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<FormDefinitionRow>, AppError> {
    let form = forms_service::archive(&state.pool, &auth_user.actor(), form_id).await?;
    Ok(ActionResult::ok(form))
}

pub async fn published_form_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(form_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<ActionResult<PublishedForm>, AppError> {
    let published = forms_service::published_form(&state.pool, &auth_user.actor(), form_id).await?;
    Ok(ActionResult::ok(published))
}

#[derive(Debug, Deserialize)]
pub struct SubmissionBody {
    #[serde(default)]
    pub child_id: Option<Uuid>,
    #[serde(default)]
    pub answers: Map<String, Value>,
}

pub async fn submit_form_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(form_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<SubmissionBody>,
) -> Result<ActionResult<FormSubmissionRow>, AppError> {
    let submission = forms_service::submit(
        &state.pool,
        &auth_user.actor(),
        form_id,
        body.child_id,
        body.answers,
    )
    .await?;
    Ok(ActionResult::ok(submission))
}

#[derive(Debug, Deserialize, Default)]
pub struct SubmissionsQuery {
    pub limit: Option<i64>,
}

pub async fn list_submissions_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(form_id): Path<Uuid>,
    Query(query): Query<SubmissionsQuery>,
    State(state): State<AppState>,
) -> Result<ActionResult<Vec<FormSubmissionRow>>, AppError> {
    let rows =
        forms_service::list_submissions(&state.pool, &auth_user.actor(), form_id, query.limit)
            .await?;
    Ok(ActionResult::ok(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_view_keeps_entered_values_and_errors() {
        let def = FieldDefinition::new("sports", "Sports", FieldType::MultiSelect)
            .with_options(&[("swim", "Swimming"), ("hike", "Hiking")]);
        let mut values = HashMap::new();
        values.insert("sports".to_string(), vec!["hike".to_string()]);
        let errors = vec![FieldError::new("sports", "Pick at least 2")];

        let view = field_view(&def, &values, &errors);
        assert!(view.is_multi);
        assert_eq!(view.error, "Pick at least 2");
        let selected: Vec<&str> = view
            .options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(selected, vec!["hike"]);
    }

    #[test]
    fn test_input_types() {
        assert_eq!(input_type(FieldType::Phone), "tel");
        assert_eq!(input_type(FieldType::Signature), "text");
    }
}
