//! P2P encrypted file transfer signaling routes (spec §4.4's file-transfer
//! half, spec §6 `p2p_file_*`).

use crate::error::ApiResult;
use crate::events::EventBus;
use crate::models::{P2PFileAnswer, P2PFileDecline, P2PFileIce, P2PFileOffer};
use crate::p2p::{self, TransferRegistry};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::registry::ConnectionRegistry;
use rocket::serde::json::Json;
use rocket::{post, State};

use super::AuthUser;

fn rate_limited(limiter: &RateLimiter, rl_cfg: &RateLimitConfig, key: &str) -> ApiResult<()> {
    let info = limiter.check_with_info(&format!("p2p_signal:{key}"), rl_cfg.p2p_signal_max, rl_cfg.p2p_signal_window_secs);
    if !info.allowed {
        return Err(crate::error::ApiError::RateLimited {
            message: format!("too many requests, retry in {}s", info.retry_after_secs),
            retry_after_secs: info.retry_after_secs,
        });
    }
    Ok(())
}

#[post("/api/v1/p2p/offer", format = "json", data = "<body>")]
pub fn p2p_offer(
    transfers: &State<TransferRegistry>,
    registry: &State<ConnectionRegistry>,
    events: &State<EventBus>,
    rl_cfg: &State<RateLimitConfig>,
    limiter: &State<RateLimiter>,
    user: AuthUser,
    body: Json<P2PFileOffer>,
) -> ApiResult<()> {
    rate_limited(limiter, rl_cfg, &user.0.username)?;
    p2p::offer(transfers, registry, events, &body.transfer_id, &user.0.username, &body.to, body.meta.clone())
}

#[post("/api/v1/p2p/answer", format = "json", data = "<body>")]
pub fn p2p_answer(transfers: &State<TransferRegistry>, events: &State<EventBus>, user: AuthUser, body: Json<P2PFileAnswer>) -> ApiResult<()> {
    p2p::answer(transfers, events, &user.0.username, &body.transfer_id, body.sdp.clone())
}

#[post("/api/v1/p2p/decline", format = "json", data = "<body>")]
pub fn p2p_decline(transfers: &State<TransferRegistry>, events: &State<EventBus>, user: AuthUser, body: Json<P2PFileDecline>) -> ApiResult<()> {
    p2p::decline(transfers, events, &user.0.username, &body.transfer_id)
}

#[post("/api/v1/p2p/ice", format = "json", data = "<body>")]
pub fn p2p_ice(transfers: &State<TransferRegistry>, events: &State<EventBus>, user: AuthUser, body: Json<P2PFileIce>) -> ApiResult<()> {
    p2p::relay_ice(transfers, events, &user.0.username, &body.transfer_id, body.candidate.clone())
}

#[post("/api/v1/p2p/<transfer_id>/active")]
pub fn p2p_mark_active(transfers: &State<TransferRegistry>, events: &State<EventBus>, user: AuthUser, transfer_id: &str) -> ApiResult<()> {
    p2p::mark_active(transfers, events, &user.0.username, transfer_id)
}

#[post("/api/v1/p2p/<transfer_id>/done")]
pub fn p2p_mark_done(transfers: &State<TransferRegistry>, events: &State<EventBus>, user: AuthUser, transfer_id: &str) -> ApiResult<()> {
    p2p::mark_done(transfers, events, &user.0.username, transfer_id)
}

#[post("/api/v1/p2p/<transfer_id>/failed")]
pub fn p2p_mark_failed(transfers: &State<TransferRegistry>, events: &State<EventBus>, user: AuthUser, transfer_id: &str) -> ApiResult<()> {
    p2p::mark_failed(transfers, events, &user.0.username, transfer_id)
}
