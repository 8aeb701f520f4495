//! Group chat routes (spec §6 `group_message`/`join_group_chat`/
//! `get_group_history`/`get_group_members`).

use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::events::{ChatEvent, EventBus};
use crate::models::{
    ChatMessage, CreateGroupRequest, Group, GroupInvite, GroupInviteRequest, HistoryPage, HistoryQuery,
    SendGroupMessage,
};
use crate::relay;
use rocket::serde::json::Json;
use rocket::{get, post, State};

use super::AuthUser;

#[post("/api/v1/groups", format = "json", data = "<body>")]
pub fn create_group(db: &State<Db>, user: AuthUser, body: Json<CreateGroupRequest>) -> ApiResult<Json<Group>> {
    let conn = db.conn();
    db::create_group(&conn, &body.name, &user.0.username).map(Json)
}

/// Any existing member may invite another user directly; there is no
/// pending-invite state for groups, unlike room invites.
#[post("/api/v1/groups/<group_id>/invite/<invitee>")]
pub fn invite_to_group(db: &State<Db>, user: AuthUser, group_id: i64, invitee: &str) -> ApiResult<()> {
    let conn = db.conn();
    db::find_group(&conn, group_id)?.ok_or_else(|| ApiError::NotFound("group not found".into()))?;
    if !db::is_group_member(&conn, group_id, &user.0.username)? {
        return Err(ApiError::NotInRoom);
    }
    db::add_group_member(&conn, group_id, invitee)
}

#[post("/api/v1/groups/<group_id>/messages", format = "json", data = "<body>")]
pub fn send_group_message(
    db: &State<Db>,
    events: &State<EventBus>,
    user: AuthUser,
    group_id: i64,
    body: Json<SendGroupMessage>,
) -> ApiResult<Json<ChatMessage>> {
    if group_id != body.group_id {
        return Err(ApiError::BadInput("group_id in path must match body".into()));
    }
    relay::send_group_message(db, events, group_id, &user.0.username, body.message.as_deref(), body.cipher.as_deref())
        .map(Json)
}

#[get("/api/v1/groups/<group_id>/members")]
pub fn group_members(db: &State<Db>, user: AuthUser, group_id: i64) -> ApiResult<Json<Vec<String>>> {
    let conn = db.conn();
    if !db::is_group_member(&conn, group_id, &user.0.username)? {
        return Err(ApiError::NotInRoom);
    }
    db::group_members(&conn, group_id).map(Json)
}

/// Single-use group invite, for clients that want an explicit accept step
/// rather than the direct-add `invite_to_group` above.
#[post("/api/v1/groups/invite", format = "json", data = "<body>")]
pub fn invite_to_group_pending(
    db: &State<Db>,
    events: &State<EventBus>,
    user: AuthUser,
    body: Json<GroupInviteRequest>,
) -> ApiResult<Json<GroupInvite>> {
    let conn = db.conn();
    db::find_group(&conn, body.group_id)?.ok_or_else(|| ApiError::NotFound("group not found".into()))?;
    if !db::is_group_member(&conn, body.group_id, &user.0.username)? {
        return Err(ApiError::NotInRoom);
    }
    let invite = db::create_group_invite(&conn, body.group_id, &body.invitee, &user.0.username)?;
    events.publish(ChatEvent::GroupInviteReceived(invite.clone()));
    Ok(Json(invite))
}

/// Pending group invites addressed to the caller.
#[get("/api/v1/groups/invites")]
pub fn list_group_invites(db: &State<Db>, user: AuthUser) -> ApiResult<Json<Vec<GroupInvite>>> {
    let conn = db.conn();
    db::pending_group_invites_for(&conn, &user.0.username).map(Json)
}

/// Consume a pending invite, admitting the caller to the group.
#[post("/api/v1/groups/invites/<invite_id>/accept")]
pub fn accept_group_invite(db: &State<Db>, user: AuthUser, invite_id: &str) -> ApiResult<Json<Group>> {
    let conn = db.conn();
    db::consume_group_invite(&conn, invite_id, &user.0.username).map(Json)
}

#[get("/api/v1/groups/<group_id>/history?<before_id>&<limit>")]
pub fn group_history(
    db: &State<Db>,
    user: AuthUser,
    group_id: i64,
    before_id: Option<String>,
    limit: Option<i64>,
) -> ApiResult<Json<HistoryPage>> {
    let conn = db.conn();
    if !db::is_group_member(&conn, group_id, &user.0.username)? {
        return Err(ApiError::NotInRoom);
    }
    drop(conn);
    relay::history(db, "group", &group_id.to_string(), 200, &HistoryQuery { before_id, limit }).map(Json)
}
