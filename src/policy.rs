//! Room Policy Engine (spec §4.5). Holds/derives locked, read-only and
//! slowmode state and performs autoscaling sub-room join selection.

use crate::config::AppConfig;
use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::events::{ChatEvent, EventBus};
use crate::models::{Room, RoomPolicyState, RoomPolicyUpdate, RoomRole};

/// Can `username` override locked/read-only/slowmode? Owners and
/// moderators always can; everyone else follows room policy as written.
pub fn can_override(conn: &rusqlite::Connection, room_id: &str, username: &str) -> ApiResult<bool> {
    let role = db::member_role(conn, room_id, username)?;
    Ok(role.map(|r| r.can_override_policy()).unwrap_or(false))
}

/// Enforce room policy before a send: membership, lock, read-only,
/// slowmode, in that order (matches spec §4.3's stated check order).
pub fn enforce_send_policy(conn: &rusqlite::Connection, room: &Room, username: &str) -> ApiResult<()> {
    let role = db::member_role(conn, &room.id, username)?;
    let Some(role) = role else { return Err(ApiError::NotInRoom) };
    let overrides = role.can_override_policy();

    if room.readonly && !overrides {
        return Err(ApiError::ReadOnly);
    }
    if room.locked && !overrides {
        return Err(ApiError::Locked);
    }
    if room.slowmode_seconds > 0 && !overrides
        && let Some(last) = db::last_post_at(conn, &room.id, username)?
        && let Ok(last_ts) = chrono::DateTime::parse_from_rfc3339(&last)
    {
        let elapsed = chrono::Utc::now().signed_duration_since(last_ts).num_seconds();
        if elapsed < room.slowmode_seconds {
            return Err(ApiError::SlowMode { retry_after_secs: room.slowmode_seconds - elapsed });
        }
    }
    Ok(())
}

pub fn derive_can_send(room: &Room, overrides: bool) -> (bool, Option<String>) {
    if room.locked && !overrides {
        return (false, Some("locked".to_string()));
    }
    if room.readonly && !overrides {
        return (false, Some("readonly".to_string()));
    }
    (true, None)
}

pub fn broadcast_policy_state(events: &EventBus, conn: &rusqlite::Connection, room: &Room, viewer: &str, set_by: &str) -> ApiResult<()> {
    let overrides = can_override(conn, &room.id, viewer)?;
    let (can_send, block_reason) = derive_can_send(room, overrides);
    events.publish(ChatEvent::RoomPolicyChanged(RoomPolicyState {
        room: room.name.clone(),
        locked: room.locked,
        readonly: room.readonly,
        slowmode_seconds: room.slowmode_seconds,
        can_send,
        block_reason,
        set_by: set_by.to_string(),
        ts: chrono::Utc::now().to_rfc3339(),
    }));
    Ok(())
}

pub fn update_policy(db: &Db, events: &EventBus, room_id: &str, update: &RoomPolicyUpdate) -> ApiResult<()> {
    let conn = db.conn();
    db::set_policy(&conn, room_id, update.locked, update.readonly, update.slowmode_seconds)?;
    let room = db::find_room_by_id(&conn, room_id)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    broadcast_policy_state(events, &conn, &room, &update.set_by, &update.set_by)
}

/// Join a room, routing to an autoscaled sub-room when the target is at
/// capacity. Selection: first sub-room `Name(2)..Name(MaxSubrooms)` with
/// free capacity; creation is serialized by virtue of the single-writer
/// `Db` mutex covering the whole find-or-create sequence.
pub fn join_with_autoscaling(db: &Db, cfg: &AppConfig, room_name: &str, username: &str) -> ApiResult<Room> {
    let conn = db.conn();
    let room = db::find_room_by_name(&conn, room_name)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;

    let cap = room.capacity.unwrap_or(i64::MAX);
    let count = db::member_count(&conn, &room.id)?;
    if count < cap {
        db::add_member(&conn, &room.id, username, RoomRole::Member)?;
        return Ok(room);
    }

    if let Some(open) = db::find_open_subroom(&conn, room_name, cfg.max_subrooms)? {
        db::add_member(&conn, &open.id, username, RoomRole::Member)?;
        return Ok(open);
    }

    for k in 2..=cfg.max_subrooms {
        let candidate_name = format!("{room_name}({k})");
        if db::find_room_by_name(&conn, &candidate_name)?.is_none() {
            let sub = db::create_subroom(&conn, &room, k, username)?;
            db::add_member(&conn, &sub.id, username, RoomRole::Member)?;
            return Ok(sub);
        }
    }

    Err(ApiError::Conflict(format!("room '{room_name}' and all sub-rooms are full")))
}
