//! Application configuration, env-first with sane defaults, following
//! `RateLimitConfig::from_env()`'s pattern from the rate limiter.

use std::env;

fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(default)
}

/// Resolve the storage DSN: environment, then config file, then default.
/// The config file is a flat `key=value` file (`echochat.toml`'s
/// `database_path` line specifically); we only look for that one key so a
/// full TOML parser isn't pulled in for a single setting.
pub fn resolve_database_path() -> String {
    if let Ok(v) = env::var("DATABASE_PATH") {
        return v;
    }
    if let Ok(contents) = std::fs::read_to_string("echochat.toml") {
        for line in contents.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("database_path") {
                let rest = rest.trim_start_matches('=').trim().trim_matches('"');
                if !rest.is_empty() {
                    return rest.to_string();
                }
            }
        }
    }
    "data/echochat.db".to_string()
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Consecutive bad logins before a lockout is applied.
    pub lockout_attempts: u32,
    /// Lockout duration once triggered.
    pub lockout_window_secs: i64,
    /// Session idle timeout; a background sweep terminates sessions past this.
    pub idle_logout_secs: i64,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// Default room message-history page size on join.
    pub default_history_limit: i64,
    pub max_subrooms: u32,
    /// Default voice room capacity; 0 = unbounded.
    pub default_voice_cap: u32,
    pub p2p_handshake_timeout_secs: i64,
    pub p2p_transfer_timeout_secs: i64,
    /// HMAC signing secret for access/refresh tokens.
    pub jwt_secret: String,
    /// When false, secrets read from the config file are never written back to it.
    pub persist_secrets: bool,
    /// Anti-abuse Governor layer 3 (spec §4.6): content heuristics, plaintext
    /// rooms only. Max link/magnet references per message.
    pub content_max_links: usize,
    /// Max `@mention` tokens per message.
    pub content_max_mentions: usize,
    /// A plaintext message identical to the author's immediately prior one
    /// in the same room is suppressed if posted within this window.
    pub content_duplicate_window_secs: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            lockout_attempts: 5,
            lockout_window_secs: 900,
            idle_logout_secs: 1800,
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 60 * 60 * 24 * 30,
            default_history_limit: 200,
            max_subrooms: 8,
            default_voice_cap: 0,
            p2p_handshake_timeout_secs: 30,
            p2p_transfer_timeout_secs: 3600,
            jwt_secret: "dev-insecure-signing-secret-change-me".to_string(),
            persist_secrets: false,
            content_max_links: 5,
            content_max_mentions: 10,
            content_duplicate_window_secs: 30,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        c.lockout_attempts = env_num("LOCKOUT_ATTEMPTS", c.lockout_attempts);
        c.lockout_window_secs = env_num("LOCKOUT_WINDOW_SECS", c.lockout_window_secs);
        c.idle_logout_secs = env_num("IDLE_LOGOUT_SECS", c.idle_logout_secs);
        c.access_token_ttl_secs = env_num("ACCESS_TOKEN_TTL_SECS", c.access_token_ttl_secs);
        c.refresh_token_ttl_secs = env_num("REFRESH_TOKEN_TTL_SECS", c.refresh_token_ttl_secs);
        c.default_history_limit = env_num("DEFAULT_HISTORY_LIMIT", c.default_history_limit);
        c.max_subrooms = env_num("MAX_SUBROOMS", c.max_subrooms);
        c.default_voice_cap = env_num("DEFAULT_VOICE_CAP", c.default_voice_cap);
        c.p2p_handshake_timeout_secs =
            env_num("P2P_HANDSHAKE_TIMEOUT_SECS", c.p2p_handshake_timeout_secs);
        c.p2p_transfer_timeout_secs =
            env_num("P2P_TRANSFER_TIMEOUT_SECS", c.p2p_transfer_timeout_secs);
        if let Ok(secret) = env::var("JWT_SECRET") {
            c.jwt_secret = secret;
        }
        c.persist_secrets = env_bool("PERSIST_SECRETS", c.persist_secrets);
        c.content_max_links = env_num("CONTENT_MAX_LINKS", c.content_max_links);
        c.content_max_mentions = env_num("CONTENT_MAX_MENTIONS", c.content_max_mentions);
        c.content_duplicate_window_secs =
            env_num("CONTENT_DUPLICATE_WINDOW_SECS", c.content_duplicate_window_secs);
        c
    }
}
