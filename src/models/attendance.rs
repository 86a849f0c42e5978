use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const ATTENDANCE_PRESENT: &str = "present";
pub const ATTENDANCE_ABSENT: &str = "absent";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub child_id: Uuid,
    pub session_id: Uuid,
    pub attendance_date: NaiveDate,
    pub status: String,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<Uuid>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub checked_out_by: Option<Uuid>,
    pub note: Option<String>,
}

// One roster line: a confirmed child and, if any, the attendance for the day.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RosterRow {
    pub child_id: Uuid,
    pub child_name: String,
    pub allergies: Option<String>,
    pub status: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
}
