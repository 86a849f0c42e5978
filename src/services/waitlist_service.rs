//! Waitlist state machine.
//!
//! Entries move `waiting -> offered -> accepted | declined | expired`, and any
//! open entry can be `removed`. An offer holds a seat until it expires. Expiry
//! is applied lazily: every operation that touches a session's waitlist first
//! expires its stale offers and re-runs promotion. Callers of [`promote`] must
//! hold the session row lock (`camp_sessions_repo::lock_session`).

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::database::registrations_repo::{self, NewRegistration};
use crate::database::{camp_sessions_repo, children_repo, tenant_context, waitlist_repo};
use crate::error::AppError;
use crate::models::waitlist_entries::{
    WAITLIST_ACCEPTED, WAITLIST_DECLINED, WAITLIST_OFFERED, WAITLIST_REMOVED, WAITLIST_WAITING,
};
use crate::models::{CampSessionRow, RegistrationRow, WaitlistEntryRow, WaitlistViewRow};
use crate::permissions::{Actor, Permission};
use crate::services::{billing_service, events_service};

/// Seats still free once confirmed registrations and live offers are counted.
pub fn available_seats(capacity: i32, active_registrations: i64, live_offers: i64) -> i64 {
    (i64::from(capacity) - active_registrations - live_offers).max(0)
}

/// Saturates at the latest representable instant instead of overflowing.
pub fn offer_expiry(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Contiguous 1-based positions for entries in queue order.
pub fn renumber(ids: &[Uuid]) -> Vec<(Uuid, i32)> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| (*id, i as i32 + 1))
        .collect()
}

/// Moves `entry_id` to the 1-based `rank` and renumbers the queue. Ranks past
/// the tail clamp to the tail. Returns `None` if the entry is not waiting.
pub fn reorder(ids: &[Uuid], entry_id: Uuid, rank: usize) -> Option<Vec<(Uuid, i32)>> {
    let from = ids.iter().position(|id| *id == entry_id)?;
    let mut ordered = ids.to_vec();
    let moved = ordered.remove(from);
    let to = rank.max(1).min(ordered.len() + 1) - 1;
    ordered.insert(to, moved);
    Some(renumber(&ordered))
}

#[derive(Debug, Default, Serialize)]
pub struct PromotionReport {
    pub expired: Vec<Uuid>,
    pub offered: Vec<Uuid>,
}

/// Expires stale offers for the session, then offers freed seats to the head
/// of the queue.
pub async fn promote(
    conn: &mut PgConnection,
    session: &CampSessionRow,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<PromotionReport, AppError> {
    let mut report = PromotionReport::default();

    let expired = waitlist_repo::expire_stale_offers(conn, Some(session.id), now).await?;
    for entry in &expired {
        events_service::record_system(
            conn,
            session.organization_id,
            "waitlist.offer_expired",
            "waitlist_entry",
            entry.id,
            json!({ "session_id": session.id, "child_id": entry.child_id }),
        )
        .await?;
        info!(entry_id = %entry.id, session_id = %session.id, "waitlist offer expired");
        report.expired.push(entry.id);
    }

    if !session.is_open() {
        return Ok(report);
    }

    let active = registrations_repo::count_active(conn, session.id).await?;
    let live = waitlist_repo::count_live_offers(conn, session.id, now).await?;
    let mut seats = available_seats(session.capacity, active, live);

    while seats > 0 {
        let Some(next) = waitlist_repo::next_waiting(conn, session.id).await? else {
            break;
        };
        let expires_at = offer_expiry(now, window);
        let offered = waitlist_repo::mark_offered(conn, next.id, now, expires_at).await?;
        events_service::record_system(
            conn,
            session.organization_id,
            "waitlist.offered",
            "waitlist_entry",
            offered.id,
            json!({
                "session_id": session.id,
                "child_id": offered.child_id,
                "offer_expires_at": expires_at,
            }),
        )
        .await?;
        info!(
            entry_id = %offered.id,
            session_id = %session.id,
            %expires_at,
            "waitlist offer made"
        );
        report.offered.push(offered.id);
        seats -= 1;
    }

    if !report.offered.is_empty() {
        compact(conn, session.id).await?;
    }
    Ok(report)
}

async fn compact(conn: &mut PgConnection, session_id: Uuid) -> Result<(), AppError> {
    let ids = waitlist_repo::list_waiting_ids(conn, session_id).await?;
    waitlist_repo::set_positions(conn, &renumber(&ids)).await?;
    Ok(())
}

// Loads an entry, its session (locked) and checks the actor may act on it.
async fn load_for_update(
    conn: &mut PgConnection,
    actor: &Actor,
    entry_id: Uuid,
) -> Result<(WaitlistEntryRow, CampSessionRow), AppError> {
    let entry = waitlist_repo::load_entry(conn, entry_id)
        .await?
        .ok_or(AppError::NotFound("waitlist entry"))?;
    let session = camp_sessions_repo::lock_session(conn, entry.session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    let child = children_repo::load_child(conn, entry.child_id)
        .await?
        .ok_or(AppError::NotFound("child"))?;
    if !actor.may_handle_waitlist_for(child.guardian_id) {
        return Err(AppError::NotFound("waitlist entry"));
    }
    Ok((entry, session))
}

/// Accepts a live offer and confirms the registration. An offer past its expiry
/// is marked expired, the seat moves on, and the call fails with a conflict.
pub async fn accept_offer(
    pool: &PgPool,
    actor: &Actor,
    entry_id: Uuid,
    window: Duration,
) -> Result<RegistrationRow, AppError> {
    let now = Utc::now();
    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let (entry, session) = load_for_update(&mut tx, actor, entry_id).await?;

    if entry.status != WAITLIST_OFFERED {
        return Err(AppError::Conflict("there is no open offer for this entry".into()));
    }
    if entry.offer_expires_at.map_or(true, |at| at <= now) {
        promote(&mut tx, &session, now, window).await?;
        tx.commit().await?;
        return Err(AppError::Conflict("the offer has expired".into()));
    }

    waitlist_repo::transition(&mut tx, entry.id, &[WAITLIST_OFFERED], WAITLIST_ACCEPTED)
        .await?
        .ok_or_else(|| AppError::Conflict("the offer is no longer open".into()))?;

    let registration = registrations_repo::upsert_confirmed(
        &mut tx,
        NewRegistration {
            id: Uuid::new_v4(),
            organization_id: actor.organization_id,
            child_id: entry.child_id,
            session_id: session.id,
            form_submission_id: None,
            created_by: actor.user_id,
        },
    )
    .await?
    .ok_or_else(|| AppError::Conflict("child is already registered".into()))?;

    billing_service::post_session_fee(&mut tx, actor, &session, &registration).await?;
    events_service::record(
        &mut tx,
        actor,
        "waitlist.accepted",
        "registration",
        registration.id,
        json!({ "session_id": session.id, "entry_id": entry.id }),
    )
    .await?;
    tx.commit().await?;

    info!(
        registration_id = %registration.id,
        session_id = %session.id,
        "waitlist offer accepted"
    );
    Ok(registration)
}

pub async fn decline_offer(
    pool: &PgPool,
    actor: &Actor,
    entry_id: Uuid,
    window: Duration,
) -> Result<WaitlistEntryRow, AppError> {
    let now = Utc::now();
    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let (entry, session) = load_for_update(&mut tx, actor, entry_id).await?;

    let declined = waitlist_repo::transition(&mut tx, entry.id, &[WAITLIST_OFFERED], WAITLIST_DECLINED)
        .await?
        .ok_or_else(|| AppError::Conflict("there is no open offer for this entry".into()))?;
    events_service::record(
        &mut tx,
        actor,
        "waitlist.declined",
        "waitlist_entry",
        declined.id,
        json!({ "session_id": session.id }),
    )
    .await?;

    promote(&mut tx, &session, now, window).await?;
    tx.commit().await?;
    Ok(declined)
}

/// Takes an open entry off the waitlist. Parents withdraw their own children;
/// admins remove anyone.
pub async fn remove_entry(
    pool: &PgPool,
    actor: &Actor,
    entry_id: Uuid,
    window: Duration,
) -> Result<WaitlistEntryRow, AppError> {
    let now = Utc::now();
    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let (entry, session) = load_for_update(&mut tx, actor, entry_id).await?;

    let removed = waitlist_repo::transition(
        &mut tx,
        entry.id,
        &[WAITLIST_WAITING, WAITLIST_OFFERED],
        WAITLIST_REMOVED,
    )
    .await?
    .ok_or_else(|| AppError::Conflict("entry is no longer on the waitlist".into()))?;
    events_service::record(
        &mut tx,
        actor,
        "waitlist.removed",
        "waitlist_entry",
        removed.id,
        json!({ "session_id": session.id, "previous_status": entry.status }),
    )
    .await?;

    if entry.status == WAITLIST_OFFERED {
        promote(&mut tx, &session, now, window).await?;
    } else {
        compact(&mut tx, session.id).await?;
    }
    tx.commit().await?;
    Ok(removed)
}

/// Moves a waiting entry to a new 1-based rank.
pub async fn move_entry(
    pool: &PgPool,
    actor: &Actor,
    entry_id: Uuid,
    rank: usize,
) -> Result<Vec<WaitlistViewRow>, AppError> {
    actor.require(Permission::WaitlistManage)?;
    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let (entry, session) = load_for_update(&mut tx, actor, entry_id).await?;
    if entry.status != WAITLIST_WAITING {
        return Err(AppError::Conflict("only waiting entries can be moved".into()));
    }

    let ids = waitlist_repo::list_waiting_ids(&mut tx, session.id).await?;
    let positions = reorder(&ids, entry.id, rank)
        .ok_or_else(|| AppError::Conflict("entry is no longer waiting".into()))?;
    waitlist_repo::set_positions(&mut tx, &positions).await?;
    events_service::record(
        &mut tx,
        actor,
        "waitlist.moved",
        "waitlist_entry",
        entry.id,
        json!({ "session_id": session.id, "rank": rank }),
    )
    .await?;

    let view = waitlist_repo::list_open_for_session(&mut tx, session.id).await?;
    tx.commit().await?;
    Ok(view)
}

/// Staff view of a session's open waitlist, with stale offers applied first.
pub async fn list_for_session(
    pool: &PgPool,
    actor: &Actor,
    session_id: Uuid,
    window: Duration,
) -> Result<Vec<WaitlistViewRow>, AppError> {
    actor.require(Permission::ChildrenReadAll)?;
    let now = Utc::now();
    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let session = camp_sessions_repo::lock_session(&mut tx, session_id)
        .await?
        .ok_or(AppError::NotFound("session"))?;
    promote(&mut tx, &session, now, window).await?;
    let view = waitlist_repo::list_open_for_session(&mut tx, session.id).await?;
    tx.commit().await?;
    Ok(view)
}

/// Re-runs promotion for each session that holds a stale offer. With a
/// guardian, only sessions where that family is queued are touched.
async fn expire_and_promote(
    conn: &mut PgConnection,
    guardian_id: Option<Uuid>,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<PromotionReport, AppError> {
    let stale = waitlist_repo::list_stale_offer_sessions(conn, guardian_id, now).await?;
    // Sorted so concurrent sweeps take session locks in the same order.
    let sessions: BTreeSet<Uuid> = stale.into_iter().collect();

    let mut report = PromotionReport::default();
    for session_id in sessions {
        let Some(session) = camp_sessions_repo::lock_session(conn, session_id).await? else {
            continue;
        };
        let part = promote(conn, &session, now, window).await?;
        report.expired.extend(part.expired);
        report.offered.extend(part.offered);
    }
    Ok(report)
}

/// Expires every stale offer in the organization.
pub async fn expire_and_promote_all(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<PromotionReport, AppError> {
    expire_and_promote(conn, None, now, window).await
}

/// Expires stale offers only in the sessions `guardian_id`'s children wait on.
pub async fn expire_and_promote_for_guardian(
    conn: &mut PgConnection,
    guardian_id: Uuid,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<PromotionReport, AppError> {
    expire_and_promote(conn, Some(guardian_id), now, window).await
}

pub async fn sweep(
    pool: &PgPool,
    actor: &Actor,
    window: Duration,
) -> Result<PromotionReport, AppError> {
    actor.require(Permission::WaitlistManage)?;
    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    let report = expire_and_promote_all(&mut tx, Utc::now(), window).await?;
    tx.commit().await?;
    info!(
        organization_id = %actor.organization_id,
        expired = report.expired.len(),
        offered = report.offered.len(),
        "waitlist sweep finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_seats_counts_offers() {
        assert_eq!(available_seats(10, 8, 1), 1);
        assert_eq!(available_seats(10, 8, 2), 0);
        assert_eq!(available_seats(10, 12, 0), 0);
        assert_eq!(available_seats(0, 0, 0), 0);
    }

    #[test]
    fn test_offer_expiry() {
        let now = Utc::now();
        assert_eq!(offer_expiry(now, Duration::hours(48)) - now, Duration::hours(48));
        assert_eq!(offer_expiry(now, Duration::days(100_000_000)), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_renumber_is_contiguous() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let positions = renumber(&ids);
        assert_eq!(
            positions.iter().map(|(_, p)| *p).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(positions[2].0, ids[2]);
    }

    #[test]
    fn test_reorder_moves_entry() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        let to_front = reorder(&ids, ids[2], 1).unwrap();
        let order: Vec<Uuid> = to_front.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[1], ids[3]]);

        let to_back = reorder(&ids, ids[0], 99).unwrap();
        let order: Vec<Uuid> = to_back.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![ids[1], ids[2], ids[3], ids[0]]);
        assert_eq!(to_back.last().map(|(_, p)| *p), Some(4));

        let zero = reorder(&ids, ids[3], 0).unwrap();
        assert_eq!(zero[0].0, ids[3]);

        assert!(reorder(&ids, Uuid::new_v4(), 1).is_none());
    }
}
