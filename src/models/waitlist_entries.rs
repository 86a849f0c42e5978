use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const WAITLIST_WAITING: &str = "waiting";
pub const WAITLIST_OFFERED: &str = "offered";
pub const WAITLIST_ACCEPTED: &str = "accepted";
pub const WAITLIST_DECLINED: &str = "declined";
pub const WAITLIST_REMOVED: &str = "removed";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WaitlistEntryRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub child_id: Uuid,
    pub session_id: Uuid,
    pub position: i32,
    pub status: String,
    pub offered_at: Option<DateTime<Utc>>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WaitlistEntryRow {
    pub fn is_open(&self) -> bool {
        self.status == WAITLIST_WAITING || self.status == WAITLIST_OFFERED
    }
}

// Open entry with its 1-based rank among waiting children.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WaitlistViewRow {
    pub id: Uuid,
    pub child_id: Uuid,
    pub child_name: String,
    pub session_id: Uuid,
    pub session_name: String,
    pub status: String,
    pub rank: Option<i64>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
