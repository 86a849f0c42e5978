use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: String,
    pub subject_type: String,
    pub subject_id: Uuid,
    pub payload: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
