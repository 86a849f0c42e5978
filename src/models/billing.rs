use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const CHARGE_SESSION_FEE: &str = "session_fee";
pub const CHARGE_ADJUSTMENT: &str = "adjustment";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChargeRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub guardian_id: Uuid,
    pub registration_id: Option<Uuid>,
    pub kind: String,
    pub description: String,
    pub amount_cents: i64,
    pub voided_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub guardian_id: Uuid,
    pub amount_cents: i64,
    pub method: String,
    pub reference: Option<String>,
    pub received_at: DateTime<Utc>,
    pub recorded_by: Uuid,
}
