//! WebRTC signaling routes (spec §4.4/§6 `voice_dm_*`/`voice_room_*`). The
//! server only relays; media never touches these handlers.

use crate::config::AppConfig;
use crate::db::Db;
use crate::error::ApiResult;
use crate::events::EventBus;
use crate::models::{
    DmCall, SetVoiceCapRequest, VoiceDmAction, VoiceDmIce, VoiceDmInvite, VoiceDmSdp,
    VoiceRoomJoinRequest, VoiceRoomRoster, VoiceRoomSignal,
};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::registry::ConnectionRegistry;
use crate::voice::{self, CallRegistry};
use rocket::serde::json::Json;
use rocket::{post, put, State};

use super::{AuthUser, ConnectionId};

fn rate_limited(limiter: &RateLimiter, rl_cfg: &RateLimitConfig, action: &str, key: &str) -> ApiResult<()> {
    let (max, window) = match action {
        "voice_invite" => (rl_cfg.voice_invite_max, rl_cfg.voice_invite_window_secs),
        "p2p_signal" => (rl_cfg.p2p_signal_max, rl_cfg.p2p_signal_window_secs),
        _ => unreachable!(),
    };
    let info = limiter.check_with_info(&format!("{action}:{key}"), max, window);
    if !info.allowed {
        return Err(crate::error::ApiError::RateLimited {
            message: format!("too many requests, retry in {}s", info.retry_after_secs),
            retry_after_secs: info.retry_after_secs,
        });
    }
    Ok(())
}

#[post("/api/v1/voice/dm/invite", format = "json", data = "<body>")]
pub fn voice_dm_invite(
    calls: &State<CallRegistry>,
    registry: &State<ConnectionRegistry>,
    events: &State<EventBus>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    user: AuthUser,
    body: Json<VoiceDmInvite>,
) -> ApiResult<Json<DmCall>> {
    rate_limited(limiter, rl_cfg, "voice_invite", &user.0.username)?;
    voice::invite(calls, registry, events, &user.0.username, &body.to).map(Json)
}

#[post("/api/v1/voice/dm/accept", format = "json", data = "<body>")]
pub fn voice_dm_accept(calls: &State<CallRegistry>, events: &State<EventBus>, user: AuthUser, body: Json<VoiceDmAction>) -> ApiResult<Json<DmCall>> {
    voice::accept(calls, events, &user.0.username, &body.call_id).map(Json)
}

#[post("/api/v1/voice/dm/decline", format = "json", data = "<body>")]
pub fn voice_dm_decline(calls: &State<CallRegistry>, events: &State<EventBus>, user: AuthUser, body: Json<VoiceDmAction>) -> ApiResult<()> {
    voice::decline(calls, events, &user.0.username, &body.call_id)
}

/// Carries both SDP offer and answer; `kind` in the body distinguishes them
/// for the peer the same way `VoiceDmSdp`'s `sdp` payload is opaque to us.
#[post("/api/v1/voice/dm/sdp?<kind>", format = "json", data = "<body>")]
pub fn voice_dm_sdp(
    calls: &State<CallRegistry>,
    events: &State<EventBus>,
    user: AuthUser,
    kind: &str,
    body: Json<VoiceDmSdp>,
) -> ApiResult<()> {
    let kind: &'static str = if kind == "answer" { "answer" } else { "offer" };
    if kind == "answer" {
        voice::mark_active(calls, &user.0.username, &body.call_id)?;
    }
    voice::relay_sdp(calls, events, &user.0.username, &body.call_id, kind, body.sdp.clone())
}

#[post("/api/v1/voice/dm/ice", format = "json", data = "<body>")]
pub fn voice_dm_ice(calls: &State<CallRegistry>, events: &State<EventBus>, user: AuthUser, body: Json<VoiceDmIce>) -> ApiResult<()> {
    voice::relay_ice(calls, events, &user.0.username, &body.call_id, body.candidate.clone())
}

#[post("/api/v1/voice/dm/end", format = "json", data = "<body>")]
pub fn voice_dm_end(calls: &State<CallRegistry>, events: &State<EventBus>, user: AuthUser, body: Json<VoiceDmAction>) -> ApiResult<()> {
    voice::end(calls, events, &user.0.username, &body.call_id, "ended")
}

#[post("/api/v1/voice/room/join", format = "json", data = "<body>")]
pub fn voice_room_join(
    registry: &State<ConnectionRegistry>,
    events: &State<EventBus>,
    cfg: &State<AppConfig>,
    user: AuthUser,
    conn: ConnectionId,
    body: Json<VoiceRoomJoinRequest>,
) -> ApiResult<()> {
    voice::room_join(registry, events, &conn.0, &body.room, &user.0.username, cfg.default_voice_cap as i64)
}

#[post("/api/v1/voice/room/leave", format = "json", data = "<body>")]
pub fn voice_room_leave(
    registry: &State<ConnectionRegistry>,
    events: &State<EventBus>,
    _user: AuthUser,
    conn: ConnectionId,
    body: Json<VoiceRoomJoinRequest>,
) -> ApiResult<()> {
    voice::room_leave(registry, events, &conn.0, &body.room)
}

#[post("/api/v1/voice/room/signal?<kind>", format = "json", data = "<body>")]
pub fn voice_room_signal(
    registry: &State<ConnectionRegistry>,
    events: &State<EventBus>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    user: AuthUser,
    kind: &str,
    body: Json<VoiceRoomSignal>,
) -> ApiResult<()> {
    rate_limited(limiter, rl_cfg, "p2p_signal", &user.0.username)?;
    let kind: &'static str = match kind {
        "answer" => "answer",
        "ice" => "ice",
        _ => "offer",
    };
    voice::room_signal(registry, events, &body.room, &user.0.username, &body.to, kind, body.payload.clone())
}

/// Owner/moderator-only: reduce or raise a room's voice capacity, forcing
/// out uniformly-random members if the new cap is below the live roster.
#[put("/api/v1/voice/room/<room>/cap", format = "json", data = "<body>")]
pub fn voice_room_set_cap(
    db: &State<Db>,
    registry: &State<ConnectionRegistry>,
    events: &State<EventBus>,
    user: AuthUser,
    room: &str,
    body: Json<SetVoiceCapRequest>,
) -> ApiResult<Json<VoiceRoomRoster>> {
    use crate::error::ApiError;
    let conn = db.conn();
    let room_row = crate::db::find_room_by_name(&conn, room)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    let role = crate::db::member_role(&conn, &room_row.id, &user.0.username)?;
    if !role.map(|r| r.can_override_policy()).unwrap_or(false) {
        return Err(ApiError::Forbidden("only an owner or moderator may change voice capacity".into()));
    }
    drop(conn);
    voice::set_voice_cap(registry, events, room, body.cap);
    Ok(Json(VoiceRoomRoster { room: room.to_string(), users: registry.voice_roster(room), limit: body.cap }))
}
