use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::forms::{FieldError, SchemaError};

/// Result envelope returned by every JSON action: `{ success, data }` or `{ success, error }`.
#[derive(Debug, Serialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

#[derive(Debug, Serialize)]
pub struct ActionError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ActionResult<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("authentication required")]
    Unauthorized,
    #[error("not allowed")]
    Forbidden,
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("invalid form schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(e) if is_unique_violation(e) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::Schema(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(e) if is_unique_violation(e) => "conflict",
            AppError::Database(_) => "database_error",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::Validation(_) => "validation_failed",
            AppError::Schema(_) => "invalid_schema",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Template(_) => "render_failed",
            AppError::Upstream(_) => "bad_gateway",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Database(e) if is_unique_violation(e) => "already exists".to_string(),
            AppError::Database(_) | AppError::Template(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let fields = match &self {
            AppError::Validation(fields) => fields.clone(),
            _ => Vec::new(),
        };
        let body = ActionResult::<()> {
            success: false,
            data: None,
            error: Some(ActionError {
                code: self.code(),
                message: self.public_message(),
                fields,
            }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("child").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Validation(vec![]).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Conflict("full".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_details_are_hidden() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.public_message(), "internal error");
        assert_eq!(AppError::NotFound("session").public_message(), "session not found");
    }

    #[test]
    fn test_envelope_shape() {
        let ok = serde_json::to_value(ActionResult::ok(3)).unwrap();
        assert_eq!(ok, serde_json::json!({ "success": true, "data": 3 }));
    }
}
