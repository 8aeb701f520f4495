//! Friend graph routes (spec §6 `send_friend_request`/`accept_friend_request`/
//! `reject_friend_request`/`block_user`/`unblock_user`/`get_friends`).

use crate::db;
use crate::db::Db;
use crate::error::{ApiError, ApiResult};
use crate::events::{ChatEvent, EventBus};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use rocket::serde::json::Json;
use rocket::{get, post, State};

use super::{AuthUser, ClientIp};

fn rate_limited(limiter: &RateLimiter, rl_cfg: &RateLimitConfig, ip: &str) -> ApiResult<()> {
    let info = limiter.check_with_info(
        &format!("friend_request:{ip}"),
        rl_cfg.friend_request_max,
        rl_cfg.friend_request_window_secs,
    );
    if !info.allowed {
        return Err(crate::error::ApiError::RateLimited {
            message: format!("too many friend requests, retry in {}s", info.retry_after_secs),
            retry_after_secs: info.retry_after_secs,
        });
    }
    Ok(())
}

#[post("/api/v1/friends/requests/<to_user>")]
pub fn send_friend_request(
    db: &State<Db>,
    events: &State<EventBus>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    user: AuthUser,
    ip: ClientIp,
    to_user: &str,
) -> ApiResult<()> {
    rate_limited(limiter, rl_cfg, &ip.0)?;
    let conn = db.conn();
    if db::is_blocked(&conn, to_user, &user.0.username)? || db::is_blocked(&conn, &user.0.username, to_user)? {
        return Err(ApiError::Forbidden("friend requests are blocked between these users".into()));
    }
    db::send_friend_request(&conn, &user.0.username, to_user)?;
    events.publish(ChatEvent::FriendRequestReceived { to: to_user.to_string(), from: user.0.username });
    Ok(())
}

#[post("/api/v1/friends/requests/<from_user>/accept")]
pub fn accept_friend_request(db: &State<Db>, events: &State<EventBus>, user: AuthUser, from_user: &str) -> ApiResult<()> {
    let conn = db.conn();
    if db::accept_friend_request(&conn, from_user, &user.0.username)? {
        events.publish(ChatEvent::FriendRequestAccepted { to: from_user.to_string(), by: user.0.username });
    }
    Ok(())
}

#[post("/api/v1/friends/requests/<from_user>/reject")]
pub fn reject_friend_request(db: &State<Db>, user: AuthUser, from_user: &str) -> ApiResult<()> {
    let conn = db.conn();
    db::reject_friend_request(&conn, from_user, &user.0.username)
}

#[get("/api/v1/friends")]
pub fn list_friends(db: &State<Db>, user: AuthUser) -> ApiResult<Json<Vec<String>>> {
    let conn = db.conn();
    db::list_friends(&conn, &user.0.username).map(Json)
}

#[get("/api/v1/friends/requests/pending")]
pub fn pending_friend_requests(db: &State<Db>, user: AuthUser) -> ApiResult<Json<Vec<String>>> {
    let conn = db.conn();
    db::pending_requests_for(&conn, &user.0.username).map(Json)
}

#[post("/api/v1/blocks/<target>")]
pub fn block_user(db: &State<Db>, user: AuthUser, target: &str) -> ApiResult<()> {
    let conn = db.conn();
    db::block_user(&conn, &user.0.username, target)
}

#[post("/api/v1/blocks/<target>/remove")]
pub fn unblock_user(db: &State<Db>, user: AuthUser, target: &str) -> ApiResult<()> {
    let conn = db.conn();
    db::unblock_user(&conn, &user.0.username, target)
}
