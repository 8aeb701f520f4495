//! Session & Token Authority routes (spec §4.1, §6 `/login`, `/register`,
//! `/token/refresh`, `/logout`, `GET /get_public_key`).

use crate::auth;
use crate::config::AppConfig;
use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::events::EventBus;
use crate::models::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, RegisterRequest};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use rocket::serde::json::Json;
use rocket::{get, post, State};

use super::{AuthUser, ClientIp};

fn rate_limit(limiter: &RateLimiter, key: &str, max: usize, window_secs: u64) -> ApiResult<()> {
    let info = limiter.check_with_info(key, max, window_secs);
    if !info.allowed {
        return Err(ApiError::RateLimited {
            message: format!("too many requests, retry in {}s", info.retry_after_secs),
            retry_after_secs: info.retry_after_secs,
        });
    }
    Ok(())
}

#[post("/register", format = "json", data = "<body>")]
pub fn register(
    db: &State<Db>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    ip: ClientIp,
    body: Json<RegisterRequest>,
) -> ApiResult<()> {
    rate_limit(limiter, &format!("register:{}", ip.0), rl_cfg.register_max, rl_cfg.register_window_secs)?;
    auth::register(db, &body)
}

#[post("/login", format = "json", data = "<body>")]
pub fn login(
    db: &State<Db>,
    cfg: &State<AppConfig>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    ip: ClientIp,
    body: Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    rate_limit(limiter, &format!("login:{}", ip.0), rl_cfg.login_max, rl_cfg.login_window_secs)?;
    auth::login(db, cfg, &body).map(Json)
}

#[post("/token/refresh", format = "json", data = "<body>")]
pub fn refresh(
    db: &State<Db>,
    cfg: &State<AppConfig>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    ip: ClientIp,
    body: Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    rate_limit(limiter, &format!("refresh:{}", ip.0), rl_cfg.refresh_max, rl_cfg.refresh_window_secs)?;
    auth::refresh_rotate(db, cfg, &body.refresh_token).map(Json)
}

#[post("/logout")]
pub fn logout(db: &State<Db>, user: AuthUser) -> ApiResult<()> {
    auth::logout_session(db, &user.0)
}

/// Terminate every session for the caller, not just the one attached to
/// this access token (a "log out everywhere" action).
#[post("/logout/all")]
pub fn logout_all(db: &State<Db>, events: &State<EventBus>, user: AuthUser) -> ApiResult<()> {
    auth::logout_all(db, events, &user.0.username, "user_logout_all")
}

#[get("/get_public_key?<username>")]
pub fn get_public_key(db: &State<Db>, username: &str) -> ApiResult<Json<serde_json::Value>> {
    let conn = db.conn();
    let key = db::find_user_public_key(&conn, username)?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(serde_json::json!({ "username": username, "public_key": key })))
}
