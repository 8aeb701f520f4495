//! Admin-only routes (spec §7's admin-initiated force-logout, and the
//! supplemented global-announcement broadcast — see `SPEC_FULL.md` §10).

use crate::auth;
use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::events::{ChatEvent, EventBus};
use crate::models::RoomForcedLeave;
use rocket::serde::json::Json;
use rocket::{post, State};
use serde::Deserialize;

use super::AdminUser;

#[derive(Debug, Deserialize)]
pub struct GlobalAnnouncementRequest {
    pub message: String,
}

#[post("/api/v1/admin/users/<username>/force_logout")]
pub fn force_logout(db: &State<Db>, events: &State<EventBus>, _admin: AdminUser, username: &str) -> ApiResult<()> {
    auth::logout_all(db, events, username, "admin_force_logout")
}

/// Admin-initiated removal of a member from a room (spec §4.5:
/// `room_forced_leave` is emitted when an admin removes a user).
#[post("/api/v1/admin/rooms/<name>/members/<username>/remove")]
pub fn force_room_leave(
    db: &State<Db>,
    events: &State<EventBus>,
    _admin: AdminUser,
    name: &str,
    username: &str,
) -> ApiResult<()> {
    let conn = db.conn();
    let room = db::find_room_by_name(&conn, name)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    db::remove_member(&conn, &room.id, username)?;
    drop(conn);
    events.publish(ChatEvent::RoomForcedLeave(RoomForcedLeave {
        room: name.to_string(),
        user: username.to_string(),
        reason: "admin_removed".to_string(),
    }));
    Ok(())
}

#[post("/api/v1/admin/announcements", format = "json", data = "<body>")]
pub fn global_announcement(events: &State<EventBus>, _admin: AdminUser, body: Json<GlobalAnnouncementRequest>) -> ApiResult<()> {
    events.publish(ChatEvent::GlobalAnnouncement { message: body.message.clone() });
    Ok(())
}
