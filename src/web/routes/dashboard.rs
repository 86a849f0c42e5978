use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{ActionResult, AppError};
use crate::models::waitlist_entries::WAITLIST_OFFERED;
use crate::models::Role;
use crate::services::dashboard_service::{
    self, AdminDashboard, ParentDashboard, StaffDashboard,
};
use crate::services::waitlist_service;
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::routes::attendance::DateQuery;
use crate::web::routes::{sanitize_return_to, with_notice};
use crate::AppState;

pub struct ChildLine {
    pub name: String,
    pub age: i32,
    pub allergies: String,
}

pub struct RegistrationLine {
    pub child_name: String,
    pub session_name: String,
    pub dates: String,
    pub status: String,
}

pub struct WaitlistLine {
    pub id: Uuid,
    pub child_name: String,
    pub session_name: String,
    pub is_offered: bool,
    pub rank: i64,
    pub expires: String,
}

pub struct FormLine {
    pub form_id: Uuid,
    pub form_name: String,
    pub child_id: Uuid,
    pub child_name: String,
}

pub struct IncidentLine {
    pub occurred: String,
    pub severity: String,
    pub category: String,
    pub resolved: bool,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub full_name: String,
    pub notice: String,
    pub children: Vec<ChildLine>,
    pub registrations: Vec<RegistrationLine>,
    pub waitlist: Vec<WaitlistLine>,
    pub outstanding_forms: Vec<FormLine>,
    pub incidents: Vec<IncidentLine>,
    pub balance: String,
    pub has_credit: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct DashboardQuery {
    pub notice: Option<String>,
}

/// Whole cents as a dollar amount, e.g. `-$12.05`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

fn notice_text(code: &str) -> &'static str {
    match code {
        "offer_accepted" => "Offer accepted. The registration is confirmed.",
        "offer_declined" => "Offer declined.",
        "form_submitted" => "Form received. Thank you.",
        "error" => "Something went wrong. Please try again.",
        _ => "",
    }
}

impl DashboardTemplate {
    fn new(user: &AuthenticatedUser, notice: &str, view: ParentDashboard) -> Self {
        let today = Utc::now().date_naive();
        Self {
            full_name: user.full_name.clone(),
            notice: notice_text(notice).to_string(),
            children: view
                .children
                .iter()
                .map(|c| ChildLine {
                    name: c.display_name(),
                    age: c.age_on(today),
                    allergies: c.allergies.clone().unwrap_or_default(),
                })
                .collect(),
            registrations: view
                .registrations
                .into_iter()
                .map(|r| RegistrationLine {
                    child_name: r.child_name,
                    session_name: r.session_name,
                    dates: format!("{} to {}", r.starts_on, r.ends_on),
                    status: r.status,
                })
                .collect(),
            waitlist: view
                .waitlist
                .into_iter()
                .map(|w| WaitlistLine {
                    id: w.id,
                    child_name: w.child_name,
                    session_name: w.session_name,
                    is_offered: w.status == WAITLIST_OFFERED,
                    rank: w.rank.unwrap_or(0),
                    expires: w
                        .offer_expires_at
                        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                        .unwrap_or_default(),
                })
                .collect(),
            outstanding_forms: view
                .outstanding_forms
                .into_iter()
                .map(|f| FormLine {
                    form_id: f.form_id,
                    form_name: f.form_name,
                    child_id: f.child_id,
                    child_name: f.child_name,
                })
                .collect(),
            incidents: view
                .incidents
                .into_iter()
                .map(|i| IncidentLine {
                    occurred: i.occurred_at.format("%Y-%m-%d %H:%M").to_string(),
                    severity: i.severity,
                    category: i.category,
                    resolved: i.resolved_at.is_some(),
                })
                .collect(),
            balance: format_cents(view.balance.balance_cents.abs()),
            has_credit: view.balance.balance_cents < 0,
        }
    }
}

/// Parents get their dashboard page; staff and admins are sent to theirs.
pub async fn dashboard_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<DashboardQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    match auth_user.role {
        Role::Admin => return Ok(Redirect::to("/api/dashboard/admin").into_response()),
        Role::Staff => return Ok(Redirect::to("/api/dashboard/staff").into_response()),
        Role::Parent => {}
    }

    let view = dashboard_service::parent_dashboard(
        &state.pool,
        &auth_user.actor(),
        state.offer_window(),
    )
    .await?;
    let template = DashboardTemplate::new(&auth_user, query.notice.as_deref().unwrap_or(""), view);
    Ok(Html(template.render()?).into_response())
}

pub async fn parent_dashboard_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<ActionResult<ParentDashboard>, AppError> {
    let view = dashboard_service::parent_dashboard(
        &state.pool,
        &auth_user.actor(),
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(view))
}

pub async fn staff_dashboard_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<DateQuery>,
    State(state): State<AppState>,
) -> Result<ActionResult<StaffDashboard>, AppError> {
    let view =
        dashboard_service::staff_dashboard(&state.pool, &auth_user.actor(), query.date).await?;
    Ok(ActionResult::ok(view))
}

pub async fn admin_dashboard_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<ActionResult<AdminDashboard>, AppError> {
    let view = dashboard_service::admin_dashboard(
        &state.pool,
        &auth_user.actor(),
        state.offer_window(),
    )
    .await?;
    Ok(ActionResult::ok(view))
}

#[derive(Debug, Deserialize)]
pub struct OfferCommandForm {
    pub action: String, // accept|decline
    pub return_to: Option<String>,
}

/// Accept or decline a seat offer from the dashboard page.
pub async fn offer_command_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(entry_id): Path<Uuid>,
    State(state): State<AppState>,
    Form(form): Form<OfferCommandForm>,
) -> Response {
    let actor = auth_user.actor();
    let window = state.offer_window();
    let result = match form.action.as_str() {
        "accept" => waitlist_service::accept_offer(&state.pool, &actor, entry_id, window)
            .await
            .map(|_| "offer_accepted"),
        "decline" => waitlist_service::decline_offer(&state.pool, &actor, entry_id, window)
            .await
            .map(|_| "offer_declined"),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    let notice = match result {
        Ok(notice) => notice,
        Err(e) => {
            warn!(%entry_id, error = %e, "offer command failed");
            "error"
        }
    };

    let target = form
        .return_to
        .as_deref()
        .and_then(sanitize_return_to)
        .unwrap_or("/dashboard");
    Redirect::to(&with_notice(target, notice)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(27_500), "$275.00");
        assert_eq!(format_cents(-1_205), "-$12.05");
        assert_eq!(format_cents(7), "$0.07");
    }

    #[test]
    fn test_unknown_notice_is_silent() {
        assert_eq!(notice_text("<script>"), "");
        assert!(!notice_text("offer_accepted").is_empty());
    }
}
