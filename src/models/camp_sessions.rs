use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const SESSION_OPEN: &str = "open";
pub const SESSION_CLOSED: &str = "closed";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CampSessionRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub price_cents: i64,
    pub capacity: i32,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub registration_form_id: Option<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampSessionRow {
    pub fn is_open(&self) -> bool {
        self.status == SESSION_OPEN
    }

    pub fn accepts_age(&self, age: i32) -> bool {
        self.min_age.map_or(true, |min| age >= min) && self.max_age.map_or(true, |max| age <= max)
    }

    pub fn runs_on(&self, day: NaiveDate) -> bool {
        self.starts_on <= day && day <= self.ends_on
    }
}

// Occupancy figures joined onto a session for listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionOccupancyRow {
    pub id: Uuid,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub price_cents: i64,
    pub capacity: i32,
    pub status: String,
    pub enrolled: i64,
    pub waiting: i64,
    pub offered: i64,
}
