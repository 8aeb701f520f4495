//! Anti-abuse Governor (spec §4.6). Three independent layers share one
//! sliding-window primitive, directly the teacher's `RateLimiter`: HTTP
//! endpoint limits per-IP, realtime event limits per-user, and slowmode
//! per (room, user) — the last lives in `policy.rs` since it needs the
//! room's configured window, not a fixed one. Content heuristics for
//! plaintext rooms are a fourth, independent check (see `relay.rs`).

use std::collections::HashMap;
use std::env;
use std::sync::Mutex;
use std::time::Instant;

/// Configurable rate limit values, read from environment with the spec's
/// stated defaults.
pub struct RateLimitConfig {
    pub login_max: usize,
    pub login_window_secs: u64,
    pub register_max: usize,
    pub register_window_secs: u64,
    pub refresh_max: usize,
    pub refresh_window_secs: u64,

    pub room_message_max: usize,
    pub room_message_window_secs: u64,
    pub dm_send_max: usize,
    pub dm_send_window_secs: u64,
    pub room_join_max: usize,
    pub room_join_window_secs: u64,
    pub room_create_max: usize,
    pub room_create_window_secs: u64,
    pub friend_request_max: usize,
    pub friend_request_window_secs: u64,
    pub p2p_signal_max: usize,
    pub p2p_signal_window_secs: u64,
    pub voice_invite_max: usize,
    pub voice_invite_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_max: 10,
            login_window_secs: 60,
            register_max: 3,
            register_window_secs: 60,
            refresh_max: 30,
            refresh_window_secs: 60,

            room_message_max: 60,
            room_message_window_secs: 60,
            dm_send_max: 60,
            dm_send_window_secs: 60,
            room_join_max: 30,
            room_join_window_secs: 60,
            room_create_max: 10,
            room_create_window_secs: 3600,
            friend_request_max: 20,
            friend_request_window_secs: 60,
            p2p_signal_max: 120,
            p2p_signal_window_secs: 60,
            voice_invite_max: 10,
            voice_invite_window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        macro_rules! env_usize {
            ($key:expr, $field:expr) => {
                if let Ok(v) = env::var($key)
                    && let Ok(n) = v.parse::<usize>()
                {
                    $field = n;
                }
            };
        }
        env_usize!("RATE_LIMIT_LOGIN", c.login_max);
        env_usize!("RATE_LIMIT_REGISTER", c.register_max);
        env_usize!("RATE_LIMIT_REFRESH", c.refresh_max);
        env_usize!("RATE_LIMIT_ROOM_MESSAGE", c.room_message_max);
        env_usize!("RATE_LIMIT_DM_SEND", c.dm_send_max);
        env_usize!("RATE_LIMIT_ROOM_JOIN", c.room_join_max);
        env_usize!("RATE_LIMIT_ROOM_CREATE", c.room_create_max);
        env_usize!("RATE_LIMIT_FRIEND_REQUEST", c.friend_request_max);
        env_usize!("RATE_LIMIT_P2P_SIGNAL", c.p2p_signal_max);
        env_usize!("RATE_LIMIT_VOICE_INVITE", c.voice_invite_max);
        c
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    pub retry_after_secs: u64,
}

pub struct RateLimiter {
    limits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter { limits: Mutex::new(HashMap::new()) }
    }

    pub fn check(&self, key: &str, max: usize, window_secs: u64) -> bool {
        self.check_with_info(key, max, window_secs).allowed
    }

    /// `key` is typically "action:identity" where identity is an IP for
    /// HTTP-layer checks or a username for realtime-layer checks.
    pub fn check_with_info(&self, key: &str, max: usize, window_secs: u64) -> RateLimitInfo {
        let mut limits = self.limits.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let window = std::time::Duration::from_secs(window_secs);

        let entries = limits.entry(key.to_string()).or_default();
        entries.retain(|t| now.duration_since(*t) < window);

        if entries.len() >= max {
            let oldest = *entries.iter().min().unwrap();
            let elapsed = now.duration_since(oldest);
            let retry_after = if elapsed < window { (window - elapsed).as_secs() + 1 } else { 1 };
            return RateLimitInfo { allowed: false, limit: max, remaining: 0, retry_after_secs: retry_after };
        }

        entries.push(now);
        RateLimitInfo { allowed: true, limit: max, remaining: max - entries.len(), retry_after_secs: 0 }
    }
}
