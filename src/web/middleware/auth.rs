use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cookie::Cookie;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::config::Tenancy;
use crate::database::users_repo;
use crate::error::AppError;
use crate::models::Role;
use crate::permissions::Actor;
use crate::AppState;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const DEV_USER_COOKIE: &str = "dev_user_id";

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
    pub email: String,
    pub full_name: String,
}

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            organization_id: self.organization_id,
            role: self.role,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Value of cookie `name` from a `Cookie` header. Malformed pairs are skipped.
pub fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    Cookie::split_parse(cookies)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn request_cookie(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(header::COOKIE)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|cookies| cookie_value(cookies, name))
}

/// Verifies an HS256 access token and returns the user id it was issued for.
pub fn verify_token(token: &str, secret: &str) -> Option<Uuid> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| warn!(error = %e, "access token rejected"))
        .ok()?;
    Uuid::parse_str(&data.claims.sub).ok()
}

fn reject(request: &Request) -> Response {
    if request.uri().path().starts_with("/api/") {
        return AppError::Unauthorized.into_response();
    }
    Redirect::to("/login").into_response()
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(&request)
        .map(str::to_string)
        .or_else(|| request_cookie(&request, ACCESS_COOKIE));

    let user_id = match token {
        Some(token) => verify_token(&token, &state.config.jwt_secret),
        // Local development without the auth service.
        None if state.config.dev_mode => {
            request_cookie(&request, DEV_USER_COOKIE).and_then(|v| Uuid::parse_str(&v).ok())
        }
        None => None,
    };
    let Some(user_id) = user_id else {
        return reject(&request);
    };

    let user = match users_repo::load_user_by_id(&state.pool, user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(%user_id, "token for unknown user");
            return reject(&request);
        }
        Err(e) => return AppError::Database(e).into_response(),
    };

    if let Tenancy::Single(organization_id) = state.config.tenancy {
        if user.organization_id != organization_id {
            warn!(%user_id, "user from another organization refused in single-tenant mode");
            return AppError::Forbidden.into_response();
        }
    }

    let Some(role) = Role::parse(&user.role) else {
        warn!(%user_id, role = %user.role, "user has an unknown role");
        return AppError::Forbidden.into_response();
    };

    request.extensions_mut().insert(AuthenticatedUser {
        id: user.id,
        organization_id: user.organization_id,
        role,
        email: user.email,
        full_name: user.full_name,
    });
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: usize,
    }

    fn token(sub: &str, secret: &str, exp: usize) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &TestClaims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn test_cookie_value() {
        let header = "theme=dark; access_token=abc.def.ghi; dev_user_id=";
        assert_eq!(cookie_value(header, "access_token").as_deref(), Some("abc.def.ghi"));
        assert_eq!(cookie_value(header, "dev_user_id"), None);
        assert_eq!(cookie_value(header, "access"), None);
        assert_eq!(cookie_value("", "access_token"), None);
    }

    #[test]
    fn test_cookie_value_tolerates_odd_headers() {
        // No space after the separator, a nameless pair and a trailing `;`.
        let header = "=junk;theme=dark;access_token=abc.def;";
        assert_eq!(cookie_value(header, "access_token").as_deref(), Some("abc.def"));
        // Only the exact name matches, never a longer one sharing its prefix.
        let header = "access_token_old=stale; access_token=fresh";
        assert_eq!(cookie_value(header, "access_token").as_deref(), Some("fresh"));
    }

    #[test]
    fn test_verify_token() {
        let id = Uuid::new_v4();
        let good = token(&id.to_string(), "s3cret", far_future());
        assert_eq!(verify_token(&good, "s3cret"), Some(id));
        assert_eq!(verify_token(&good, "other"), None);

        let expired = token(&id.to_string(), "s3cret", 1_000);
        assert_eq!(verify_token(&expired, "s3cret"), None);

        let not_uuid = token("someone", "s3cret", far_future());
        assert_eq!(verify_token(&not_uuid, "s3cret"), None);
    }
}
