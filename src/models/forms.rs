use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::forms::FieldDefinition;

pub const FORM_PUBLISHED: &str = "published";
pub const FORM_ARCHIVED: &str = "archived";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormKind {
    Registration,
    Medical,
    Consent,
    Custom,
}

impl FormKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FormKind::Registration => "registration",
            FormKind::Medical => "medical",
            FormKind::Consent => "consent",
            FormKind::Custom => "custom",
        }
    }

    /// Medical and consent forms must be on file once per child.
    pub fn required_per_child(self) -> bool {
        matches!(self, FormKind::Medical | FormKind::Consent)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FormDefinitionRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub form_kind: String,
    pub fields: Json<Vec<FieldDefinition>>,
    pub status: String,
    pub current_version: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FormVersionRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub form_id: Uuid,
    pub version: i32,
    pub fields: Json<Vec<FieldDefinition>>,
    pub published_by: Option<Uuid>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FormSubmissionRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub form_id: Uuid,
    pub form_version_id: Uuid,
    pub version: i32,
    pub child_id: Option<Uuid>,
    pub submitted_by: Uuid,
    pub answers: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// A required form a child has no submission for yet.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OutstandingFormRow {
    pub form_id: Uuid,
    pub form_name: String,
    pub form_kind: String,
    pub child_id: Uuid,
    pub child_name: String,
}
