use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RegistrationRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub child_id: Uuid,
    pub session_id: Uuid,
    pub status: String,
    pub form_submission_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

// Registration joined with child and session names for dashboards.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RegistrationSummaryRow {
    pub id: Uuid,
    pub child_id: Uuid,
    pub child_name: String,
    pub session_id: Uuid,
    pub session_name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
