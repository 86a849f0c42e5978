use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChildRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub guardian_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChildRow {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on `on`.
    pub fn age_on(&self, on: NaiveDate) -> i32 {
        age_on(self.date_of_birth, on)
    }
}

pub fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - date_of_birth.year();
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_on() {
        assert_eq!(age_on(date(2015, 7, 10), date(2025, 7, 9)), 9);
        assert_eq!(age_on(date(2015, 7, 10), date(2025, 7, 10)), 10);
        assert_eq!(age_on(date(2016, 2, 29), date(2025, 2, 28)), 8);
        assert_eq!(age_on(date(2016, 2, 29), date(2025, 3, 1)), 9);
    }
}
