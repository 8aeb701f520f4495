// Route module decomposition — each domain area in its own file.
// Shared request guards live here; route functions in submodules.

mod admin;
mod auth;
mod dm;
mod files;
mod friends;
mod groups;
mod p2p;
mod presence;
mod reactions;
mod rooms;
mod stream;
mod system;
mod voice;

// --- Re-exports (all route functions used by lib.rs mount) ---

pub use admin::{force_logout, force_room_leave, global_announcement};
pub use auth::{get_public_key, login, logout, logout_all, refresh, register};
pub use dm::{fetch_offline_pms, get_missed_pm_summary, send_dm};
pub use files::{download_file, file_meta, upload_file};
pub use friends::{
    accept_friend_request, block_user, list_friends, pending_friend_requests, reject_friend_request,
    send_friend_request, unblock_user,
};
pub use groups::{
    accept_group_invite, create_group, group_history, group_members, invite_to_group,
    invite_to_group_pending, list_group_invites, send_group_message,
};
pub use p2p::{
    p2p_answer, p2p_decline, p2p_ice, p2p_mark_active, p2p_mark_done, p2p_mark_failed, p2p_offer,
};
pub use presence::{get_friend_presence, get_my_presence, set_my_presence};
pub use reactions::react_to_message;
pub use rooms::{
    accept_room_invite, create_room, get_room_counts, get_rooms, get_users_in_room, invite_to_room,
    join_room, leave_room, list_room_invites, room_history, send_room_message, update_room_policy,
};
pub use stream::stream;
pub use system::{health, not_found, too_many_requests, unauthorized};
pub use voice::{
    voice_dm_accept, voice_dm_decline, voice_dm_end, voice_dm_ice, voice_dm_invite, voice_dm_sdp,
    voice_room_join, voice_room_leave, voice_room_set_cap, voice_room_signal,
};

// --- Shared request guards ---

use crate::auth;
use crate::config::AppConfig;
use crate::db::Db;
use crate::error::ApiError;
use crate::models::AuthClaims;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};

/// Caller's IP, trusting `X-Forwarded-For` ahead of the socket address so a
/// reverse-proxied deployment still rate-limits on the real client.
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| req.remote().map(|r| r.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

/// The caller's live stream connection id, set on the `connected` event at
/// `stream` time and echoed back by the client on every subsequent call that
/// needs to know which open stream it is acting on behalf of (voice-room
/// join/leave, room roster join/leave).
pub struct ConnectionId(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ConnectionId {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.headers().get_one("X-Connection-Id") {
            Some(id) if !id.trim().is_empty() => Outcome::Success(ConnectionId(id.trim().to_string())),
            _ => Outcome::Error((
                Status::BadRequest,
                ApiError::BadInput("missing X-Connection-Id header".into()),
            )),
        }
    }
}

/// An authenticated caller. Extracts `Authorization: Bearer <access token>`
/// and runs it through the Session & Token Authority, the same validation
/// a realtime connection attempt goes through before the registry accepts it.
pub struct AuthUser(pub AuthClaims);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(token) = req
            .headers()
            .get_one("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
        else {
            return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized("missing bearer token".into())));
        };
        let Some(db) = req.rocket().state::<Db>() else {
            return Outcome::Error((Status::InternalServerError, ApiError::Internal("db not managed".into())));
        };
        let Some(cfg) = req.rocket().state::<AppConfig>() else {
            return Outcome::Error((Status::InternalServerError, ApiError::Internal("config not managed".into())));
        };
        match auth::validate(db, cfg, token) {
            Ok(claims) => Outcome::Success(AuthUser(claims)),
            Err(e) => Outcome::Error((e.status(), e)),
        }
    }
}

/// An authenticated caller who also holds the admin role (spec's
/// supplemented admin surface: global announcements, forced logout).
pub struct AdminUser(pub AuthClaims);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthUser::from_request(req).await {
            Outcome::Success(AuthUser(claims)) if claims.is_admin => Outcome::Success(AdminUser(claims)),
            Outcome::Success(_) => Outcome::Error((Status::Forbidden, ApiError::Forbidden("admin role required".into()))),
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(f) => Outcome::Forward(f),
        }
    }
}
