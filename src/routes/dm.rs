//! Direct message routes (spec §4.3/§4.4, §6 DM surface).

use crate::db::Db;
use crate::error::ApiResult;
use crate::events::EventBus;
use crate::models::{FetchOfflineQuery, MissedPmSummaryEntry, OfflineMessageOut, SendDirectMessage};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::registry::ConnectionRegistry;
use crate::relay;
use rocket::serde::json::Json;
use rocket::{get, post, State};

use super::{AuthUser, ClientIp};

#[post("/api/v1/dm", format = "json", data = "<body>")]
pub fn send_dm(
    db: &State<Db>,
    events: &State<EventBus>,
    registry: &State<ConnectionRegistry>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    user: AuthUser,
    ip: ClientIp,
    body: Json<SendDirectMessage>,
) -> ApiResult<()> {
    let info = limiter.check_with_info(&format!("dm_send:{}", ip.0), rl_cfg.dm_send_max, rl_cfg.dm_send_window_secs);
    if !info.allowed {
        return Err(crate::error::ApiError::RateLimited {
            message: format!("too many DMs, retry in {}s", info.retry_after_secs),
            retry_after_secs: info.retry_after_secs,
        });
    }
    relay::send_dm(db, events, registry, &user.0.username, &body.to, &body.cipher)
}

#[get("/api/v1/dm/offline?<from_user>&<peek>")]
pub fn fetch_offline_pms(
    db: &State<Db>,
    user: AuthUser,
    from_user: String,
    peek: Option<bool>,
) -> ApiResult<Json<Vec<OfflineMessageOut>>> {
    let query = FetchOfflineQuery { from_user, peek: peek.unwrap_or(false) };
    relay::fetch_offline_pms(db, &user.0.username, &query).map(Json)
}

#[get("/api/v1/dm/missed_summary")]
pub fn get_missed_pm_summary(db: &State<Db>, user: AuthUser) -> ApiResult<Json<Vec<MissedPmSummaryEntry>>> {
    relay::get_missed_pm_summary(db, &user.0.username).map(Json)
}
