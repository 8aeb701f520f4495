//! Room routes (spec §4.3/§4.5, §6 room catalog + policy surface).

use crate::config::AppConfig;
use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::events::{ChatEvent, EventBus};
use crate::models::{
    ChatMessage, CreateRoomRequest, HistoryPage, HistoryQuery, JoinRoomResponse, Room,
    RoomInvite, RoomInviteRequest, RoomPolicyUpdate, RoomRole, SendRoomMessage,
};
use crate::policy;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::registry::ConnectionRegistry;
use crate::relay;
use rocket::serde::json::Json;
use rocket::{get, post, put, State};

use super::{AuthUser, ClientIp};

fn rate_limited(limiter: &RateLimiter, rl_cfg: &RateLimitConfig, action: &str, ip: &str) -> ApiResult<()> {
    let (max, window) = match action {
        "room_create" => (rl_cfg.room_create_max, rl_cfg.room_create_window_secs),
        "room_join" => (rl_cfg.room_join_max, rl_cfg.room_join_window_secs),
        "room_message" => (rl_cfg.room_message_max, rl_cfg.room_message_window_secs),
        _ => unreachable!(),
    };
    let info = limiter.check_with_info(&format!("{action}:{ip}"), max, window);
    if !info.allowed {
        return Err(ApiError::RateLimited {
            message: format!("too many requests, retry in {}s", info.retry_after_secs),
            retry_after_secs: info.retry_after_secs,
        });
    }
    Ok(())
}

#[post("/api/v1/rooms", format = "json", data = "<body>")]
pub fn create_room(
    db: &State<Db>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    user: AuthUser,
    ip: ClientIp,
    body: Json<CreateRoomRequest>,
) -> ApiResult<Json<Room>> {
    rate_limited(limiter, rl_cfg, "room_create", &ip.0)?;
    let conn = db.conn();
    db::create_room(&conn, &body, &user.0.username).map(Json)
}

/// Join a room, autoscaling into a numbered sub-room if the target is full,
/// and return the page of history a new member should render immediately.
#[post("/api/v1/rooms/<name>/join")]
pub fn join_room(
    db: &State<Db>,
    cfg: &State<AppConfig>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    registry: &State<ConnectionRegistry>,
    user: AuthUser,
    ip: ClientIp,
    name: &str,
) -> ApiResult<Json<JoinRoomResponse>> {
    rate_limited(limiter, rl_cfg, "room_join", &ip.0)?;
    let room = policy::join_with_autoscaling(db, cfg, name, &user.0.username)?;
    let history = relay::history(
        db,
        "room",
        &room.id,
        cfg.default_history_limit,
        &HistoryQuery { before_id: None, limit: None },
    )?;
    let _ = registry; // roster membership is tracked per-SSE-connection, not per HTTP join call
    Ok(Json(JoinRoomResponse { room: room.name, history: history.messages }))
}

#[get("/api/v1/rooms/<name>/history?<before_id>&<limit>")]
pub fn room_history(
    db: &State<Db>,
    cfg: &State<AppConfig>,
    _user: AuthUser,
    name: &str,
    before_id: Option<String>,
    limit: Option<i64>,
) -> ApiResult<Json<HistoryPage>> {
    let conn = db.conn();
    let room = db::find_room_by_name(&conn, name)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    drop(conn);
    relay::history(db, "room", &room.id, cfg.default_history_limit, &HistoryQuery { before_id, limit }).map(Json)
}

#[post("/api/v1/rooms/<name>/messages", format = "json", data = "<body>")]
pub fn send_room_message(
    db: &State<Db>,
    events: &State<EventBus>,
    cfg: &State<AppConfig>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    user: AuthUser,
    ip: ClientIp,
    name: &str,
    body: Json<SendRoomMessage>,
) -> ApiResult<Json<ChatMessage>> {
    rate_limited(limiter, rl_cfg, "room_message", &ip.0)?;
    if name != body.room {
        return Err(ApiError::BadInput("room in path must match room in body".into()));
    }
    relay::send_room_message(db, events, cfg, &body.room, &user.0.username, body.message.as_deref(), body.cipher.as_deref())
        .map(Json)
}

/// Leave a room's persistent membership. Live roster departure (the
/// connection's own `rooms` set) is handled separately by the realtime
/// stream connection it was joined on.
#[post("/api/v1/rooms/<name>/leave")]
pub fn leave_room(db: &State<Db>, user: AuthUser, name: &str) -> ApiResult<()> {
    let conn = db.conn();
    let room = db::find_room_by_name(&conn, name)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    db::remove_member(&conn, &room.id, &user.0.username)
}

/// The public room catalog (spec §6 `get_rooms`).
#[get("/api/v1/rooms")]
pub fn get_rooms(db: &State<Db>, _user: AuthUser) -> ApiResult<Json<Vec<Room>>> {
    let conn = db.conn();
    db::list_rooms(&conn).map(Json)
}

/// Usernames currently streaming this room (spec §6 `get_users_in_room`).
#[get("/api/v1/rooms/<name>/users")]
pub fn get_users_in_room(registry: &State<ConnectionRegistry>, _user: AuthUser, name: &str) -> Json<Vec<String>> {
    Json(registry.room_members_live(name))
}

/// Live per-room member counts across the whole catalog (spec §6
/// `get_room_counts`).
#[get("/api/v1/rooms/counts")]
pub fn get_room_counts(registry: &State<ConnectionRegistry>, _user: AuthUser) -> Json<std::collections::HashMap<String, i64>> {
    Json(registry.room_counts_live())
}

/// Owner/moderator-only room policy update (locked/readonly/slowmode).
#[put("/api/v1/rooms/<name>/policy", format = "json", data = "<body>")]
pub fn update_room_policy(
    db: &State<Db>,
    events: &State<EventBus>,
    user: AuthUser,
    name: &str,
    body: Json<RoomPolicyUpdate>,
) -> ApiResult<()> {
    let conn = db.conn();
    let room = db::find_room_by_name(&conn, name)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    let role = db::member_role(&conn, &room.id, &user.0.username)?;
    if !role.map(|r| r == RoomRole::Owner || r == RoomRole::Moderator).unwrap_or(false) {
        return Err(ApiError::Forbidden("only an owner or moderator may change room policy".into()));
    }
    drop(conn);
    let mut update = body.into_inner();
    update.set_by = user.0.username;
    policy::update_policy(db, events, &room.id, &update)
}

/// Any existing member may invite another user; the invite is single-use and
/// replaces any prior unconsumed invite to the same (room, invitee) pair.
#[post("/api/v1/rooms/invite", format = "json", data = "<body>")]
pub fn invite_to_room(
    db: &State<Db>,
    events: &State<EventBus>,
    user: AuthUser,
    body: Json<RoomInviteRequest>,
) -> ApiResult<Json<RoomInvite>> {
    let conn = db.conn();
    let room = db::find_room_by_name(&conn, &body.room)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    if db::member_role(&conn, &room.id, &user.0.username)?.is_none() {
        return Err(ApiError::NotInRoom);
    }
    let invite = db::create_room_invite(&conn, &room.id, &room.name, &body.invitee, &user.0.username)?;
    events.publish(ChatEvent::RoomInviteReceived(invite.clone()));
    Ok(Json(invite))
}

/// Pending room invites addressed to the caller.
#[get("/api/v1/rooms/invites")]
pub fn list_room_invites(db: &State<Db>, user: AuthUser) -> ApiResult<Json<Vec<RoomInvite>>> {
    let conn = db.conn();
    db::pending_room_invites_for(&conn, &user.0.username).map(Json)
}

/// Consume a pending invite, admitting the caller to the room.
#[post("/api/v1/rooms/invites/<invite_id>/accept")]
pub fn accept_room_invite(db: &State<Db>, user: AuthUser, invite_id: &str) -> ApiResult<Json<Room>> {
    let conn = db.conn();
    db::consume_room_invite(&conn, invite_id, &user.0.username).map(Json)
}
