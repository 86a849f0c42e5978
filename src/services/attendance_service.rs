use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::database::attendance_repo::{self, AttendanceMark};
use crate::database::tenant_context::{self, with_organization_context};
use crate::database::{camp_sessions_repo, registrations_repo};
use crate::error::AppError;
use crate::models::attendance::{ATTENDANCE_ABSENT, ATTENDANCE_PRESENT};
use crate::models::{AttendanceRow, CampSessionRow, RosterRow};
use crate::permissions::{Actor, Permission};
use crate::services::events_service;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceAction {
    CheckIn,
    CheckOut,
    Absent,
}

impl AttendanceAction {
    fn event_kind(self) -> &'static str {
        match self {
            AttendanceAction::CheckIn => "attendance.checked_in",
            AttendanceAction::CheckOut => "attendance.checked_out",
            AttendanceAction::Absent => "attendance.absent",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceInput {
    pub child_id: Uuid,
    pub action: AttendanceAction,
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Roster {
    pub session: CampSessionRow,
    pub date: NaiveDate,
    pub children: Vec<RosterRow>,
    pub present: usize,
    pub absent: usize,
    pub unmarked: usize,
}

impl Roster {
    pub fn new(session: CampSessionRow, date: NaiveDate, children: Vec<RosterRow>) -> Self {
        let present = children
            .iter()
            .filter(|c| c.status.as_deref() == Some(ATTENDANCE_PRESENT))
            .count();
        let absent = children
            .iter()
            .filter(|c| c.status.as_deref() == Some(ATTENDANCE_ABSENT))
            .count();
        let unmarked = children.len() - present - absent;
        Self {
            session,
            date,
            children,
            present,
            absent,
            unmarked,
        }
    }
}

pub async fn record(
    pool: &PgPool,
    actor: &Actor,
    session_id: Uuid,
    input: AttendanceInput,
) -> Result<AttendanceRow, AppError> {
    actor.require(Permission::AttendanceWrite)?;
    let now = Utc::now();
    let date = input.date.unwrap_or_else(|| now.date_naive());

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let session = camp_sessions_repo::load_session(&mut tx, session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    if !session.runs_on(date) {
        return Err(AppError::BadRequest(format!(
            "{} does not run on {}",
            session.name, date
        )));
    }
    if registrations_repo::find_active(&mut tx, input.child_id, session.id)
        .await?
        .is_none()
    {
        return Err(AppError::Conflict("child is not registered for this session".into()));
    }

    let note = input.note.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let mark = AttendanceMark {
        id: Uuid::new_v4(),
        organization_id: actor.organization_id,
        child_id: input.child_id,
        session_id: session.id,
        attendance_date: date,
        staff_id: actor.user_id,
        at: now,
        note,
    };
    let row = match input.action {
        AttendanceAction::CheckIn => attendance_repo::check_in(&mut tx, mark).await?,
        AttendanceAction::CheckOut => attendance_repo::check_out(&mut tx, mark)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("child must be checked in before checking out".into())
            })?,
        AttendanceAction::Absent => attendance_repo::mark_absent(&mut tx, mark)
            .await?
            .ok_or_else(|| AppError::Conflict("child is already checked in today".into()))?,
    };

    events_service::record(
        &mut tx,
        actor,
        input.action.event_kind(),
        "attendance",
        row.id,
        json!({ "child_id": row.child_id, "session_id": row.session_id, "date": date }),
    )
    .await?;
    tx.commit().await?;

    info!(
        child_id = %row.child_id,
        session_id = %row.session_id,
        kind = input.action.event_kind(),
        "attendance recorded"
    );
    Ok(row)
}

pub async fn roster_on(
    conn: &mut PgConnection,
    session: CampSessionRow,
    date: NaiveDate,
) -> Result<Roster, AppError> {
    let children = attendance_repo::load_roster(conn, session.id, date).await?;
    Ok(Roster::new(session, date, children))
}

pub async fn roster(
    pool: &PgPool,
    actor: &Actor,
    session_id: Uuid,
    date: Option<NaiveDate>,
) -> Result<Roster, AppError> {
    actor.require(Permission::AttendanceWrite)?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move {
            let session = camp_sessions_repo::load_session(conn, session_id)
                .await?
                .ok_or(AppError::NotFound("session"))?;
            roster_on(conn, session, date).await
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(status: Option<&str>) -> RosterRow {
        RosterRow {
            child_id: Uuid::new_v4(),
            child_name: "Noor de Vries".into(),
            allergies: None,
            status: status.map(str::to_string),
            checked_in_at: None,
            checked_out_at: None,
        }
    }

    #[test]
    fn test_roster_counts() {
        let session = CampSessionRow {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            name: "Week 1".into(),
            description: None,
            starts_on: NaiveDate::from_ymd_opt(2025, 7, 7).unwrap(),
            ends_on: NaiveDate::from_ymd_opt(2025, 7, 11).unwrap(),
            price_cents: 0,
            capacity: 10,
            min_age: None,
            max_age: None,
            registration_form_id: None,
            status: "open".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let date = session.starts_on;
        let roster = Roster::new(
            session,
            date,
            vec![line(Some("present")), line(Some("absent")), line(None), line(Some("present"))],
        );
        assert_eq!((roster.present, roster.absent, roster.unmarked), (2, 1, 1));
    }

    #[test]
    fn test_action_names() {
        let action: AttendanceAction = serde_json::from_str("\"check_out\"").unwrap();
        assert_eq!(action, AttendanceAction::CheckOut);
        assert_eq!(action.event_kind(), "attendance.checked_out");
    }
}
