use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::web::middleware::auth::{ACCESS_COOKIE, DEV_USER_COOKIE, REFRESH_COOKIE};
use crate::web::routes::sanitize_return_to;
use crate::AppState;

const LOGIN_PATH: &str = "/api/v1/auth/login";

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub return_to: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
}

/// Renders the error page, falling back to plain text if the template fails.
pub fn error_page(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    match (ErrorTemplate {
        message: message.clone(),
    })
    .render()
    {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "error page render failed");
            (status, message).into_response()
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct LoginQuery {
    pub return_to: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    #[serde(default)]
    return_to: Option<String>,
}

#[derive(Deserialize)]
struct AuthTokens {
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct AuthServiceResponse {
    data: AuthTokens,
}

fn render_login(return_to: Option<&str>, error: &str) -> Result<Html<String>, AppError> {
    let template = LoginTemplate {
        return_to: return_to.and_then(sanitize_return_to).unwrap_or("").to_string(),
        error: error.to_string(),
    };
    Ok(Html(template.render()?))
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> Result<Html<String>, AppError> {
    render_login(query.return_to.as_deref(), "")
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

fn append_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => error!(error = %e, cookie = cookie.name(), "cookie is not a valid header"),
    }
}

pub async fn login_handler(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    info!(email = %form.email, "login attempt");

    let url = format!(
        "{}{}",
        state.config.auth_service_url.trim_end_matches('/'),
        LOGIN_PATH
    );
    let response = reqwest::Client::new()
        .post(&url)
        .json(&json!({
            "email": form.email,
            "password": form.password,
        }))
        .send()
        .await;

    let response = match response {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "auth service unreachable");
            return Err(AppError::Upstream("the sign-in service is unavailable".into()));
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!(%status, "auth service refused login");
        let page = render_login(form.return_to.as_deref(), "Email or password is incorrect")?;
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    }

    let tokens = match response.json::<AuthServiceResponse>().await {
        Ok(body) => body.data,
        Err(e) => {
            error!(error = %e, "auth service response could not be parsed");
            return Err(AppError::Upstream("unexpected sign-in response".into()));
        }
    };

    let target = form
        .return_to
        .as_deref()
        .and_then(sanitize_return_to)
        .unwrap_or("/dashboard");
    let mut response = Redirect::to(target).into_response();
    append_cookie(&mut response, &session_cookie(ACCESS_COOKIE, tokens.access_token));
    append_cookie(&mut response, &session_cookie(REFRESH_COOKIE, tokens.refresh_token));

    info!("login succeeded");
    Ok(response)
}

pub async fn logout_handler() -> Response {
    let mut response = Redirect::to("/login").into_response();
    for name in [ACCESS_COOKIE, REFRESH_COOKIE, DEV_USER_COOKIE] {
        let mut cookie = session_cookie(name, String::new());
        cookie.make_removal();
        append_cookie(&mut response, &cookie);
    }
    response
}
