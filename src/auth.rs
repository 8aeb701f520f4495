//! Session & Token Authority (spec §4.1). Login, refresh rotation,
//! validation, idle enforcement. Credential failures and "user does not
//! exist" are reported identically to the caller to prevent enumeration.

use crate::config::AppConfig;
use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::events::{ChatEvent, EventBus};
use crate::models::{AuthClaims, JwtClaims, LoginRequest, LoginResponse, RefreshResponse, RegisterRequest, TokenKind, UserRecord};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;

fn hash_secret(secret: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("hash failure: {e}")))
}

fn verify_secret(secret: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else { return false };
    Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok()
}

pub fn register(db: &Db, req: &RegisterRequest) -> ApiResult<()> {
    let username = req.username.trim();
    if username.is_empty() || username.len() > 64 {
        return Err(ApiError::BadInput("username must be 1-64 characters".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadInput("password must be at least 8 characters".into()));
    }
    let conn = db.conn();
    let rec = UserRecord {
        username: username.to_string(),
        username_ci: db::ci(username),
        email: req.email.trim().to_string(),
        email_ci: db::ci(req.email.trim()),
        password_hash: hash_secret(&req.password)?,
        recovery_pin_hash: req.recovery_pin.as_deref().map(hash_secret).transpose()?,
        public_key: req.public_key.clone(),
        encrypted_private_key: req.encrypted_private_key.clone(),
        is_admin: false,
        roles: vec!["member".to_string()],
        lockout_count: 0,
        locked_until: None,
        last_login_at: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    db::insert_user(&conn, &rec)
}

fn mint_token_pair(
    conn: &rusqlite::Connection,
    cfg: &AppConfig,
    session_id: &str,
    username: &str,
    parent_refresh_jti: Option<&str>,
) -> ApiResult<(String, String)> {
    let now = chrono::Utc::now().timestamp();
    let access_jti = uuid::Uuid::new_v4().to_string();
    let refresh_jti = uuid::Uuid::new_v4().to_string();

    db::insert_token(conn, &access_jti, session_id, TokenKind::Access.as_str(), now, now + cfg.access_token_ttl_secs, None)?;
    db::insert_token(conn, &refresh_jti, session_id, TokenKind::Refresh.as_str(), now, now + cfg.refresh_token_ttl_secs, parent_refresh_jti)?;

    let access = sign(cfg, username, session_id, &access_jti, TokenKind::Access, now, cfg.access_token_ttl_secs)?;
    let refresh = sign(cfg, username, session_id, &refresh_jti, TokenKind::Refresh, now, cfg.refresh_token_ttl_secs)?;
    Ok((access, refresh))
}

fn sign(
    cfg: &AppConfig,
    username: &str,
    session_id: &str,
    jti: &str,
    kind: TokenKind,
    now: i64,
    ttl_secs: i64,
) -> ApiResult<String> {
    let claims = JwtClaims {
        sub: username.to_string(),
        sid: session_id.to_string(),
        jti: jti.to_string(),
        kind: kind.as_str().to_string(),
        iat: now,
        exp: now + ttl_secs,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()))
        .map_err(|e| ApiError::Internal(format!("token signing failure: {e}")))
}

fn decode_claims(cfg: &AppConfig, token: &str) -> ApiResult<JwtClaims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<JwtClaims>(token, &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthorized("invalid or expired token".into()))
}

pub fn login(db: &Db, cfg: &AppConfig, req: &LoginRequest) -> ApiResult<LoginResponse> {
    let conn = db.conn();
    let username = req.username.trim();

    let user = db::find_user_by_username(&conn, username)?;

    if let Some(ref u) = user
        && let Some(locked_until) = u.locked_until
        && locked_until > chrono::Utc::now().timestamp()
    {
        return Err(ApiError::LoginLocked { retry_after_secs: locked_until - chrono::Utc::now().timestamp() });
    }

    let ok = user.as_ref().map(|u| verify_secret(&req.password, &u.password_hash)).unwrap_or(false);
    if !ok {
        // Record the failure only if the account exists, but report the
        // same BadCredentials-shaped error either way (no enumeration).
        if let Some(ref u) = user {
            db::record_lockout_failure(&conn, &u.username, cfg.lockout_attempts, cfg.lockout_window_secs)?;
        }
        return Err(ApiError::Unauthorized("invalid username or password".into()));
    }
    let user = user.expect("ok implies user present");

    db::reset_lockout_and_record_login(&conn, &user.username)?;
    let session_id = db::create_session(&conn, &user.username, req.fingerprint.as_deref())?;
    let (access, refresh) = mint_token_pair(&conn, cfg, &session_id, &user.username, None)?;

    Ok(LoginResponse {
        access_token: access,
        refresh_token: refresh,
        username: user.username,
        expires_in: cfg.access_token_ttl_secs,
    })
}

/// Refresh rotation. Unknown/revoked/expired/already-consumed all fail
/// closed as `RefreshInvalid`. A lost race on the same jti returns
/// `Conflict`; retrying with the (now-consumed) old jti then correctly
/// returns `RefreshInvalid`.
pub fn refresh_rotate(db: &Db, cfg: &AppConfig, refresh_token: &str) -> ApiResult<RefreshResponse> {
    let claims = decode_claims(cfg, refresh_token)?;
    if claims.kind != TokenKind::Refresh.as_str() {
        return Err(ApiError::Unauthorized("not a refresh token".into()));
    }

    let conn = db.conn();
    let token = db::find_token(&conn, &claims.jti)?.ok_or_else(|| ApiError::Unauthorized("refresh token unknown".into()))?;
    if token.revoked || token.kind != "refresh" {
        return Err(ApiError::Unauthorized("refresh token invalid".into()));
    }
    if token.expires_at < chrono::Utc::now().timestamp() {
        return Err(ApiError::Unauthorized("refresh token expired".into()));
    }
    if !db::session_is_active(&conn, &token.session_id)? {
        return Err(ApiError::Unauthorized("session terminated".into()));
    }
    if token.consumed {
        return Err(ApiError::Unauthorized("refresh token already used".into()));
    }

    // Serialize per-session: the UPDATE ... WHERE consumed = 0 is the
    // compare-and-swap. Whoever flips it wins; the loser sees `false`.
    let won_race = db::consume_refresh_token_once(&conn, &claims.jti)?;
    if !won_race {
        return Err(ApiError::Conflict("refresh already in progress".into()));
    }

    let (access, refresh) = mint_token_pair(&conn, cfg, &token.session_id, &claims.sub, Some(&claims.jti))?;
    Ok(RefreshResponse { access_token: access, refresh_token: refresh, expires_in: cfg.access_token_ttl_secs })
}

/// Validate an access token for a protected call or realtime connection.
pub fn validate(db: &Db, cfg: &AppConfig, access_token: &str) -> ApiResult<AuthClaims> {
    let claims = decode_claims(cfg, access_token)?;
    if claims.kind != TokenKind::Access.as_str() {
        return Err(ApiError::Unauthorized("not an access token".into()));
    }
    let conn = db.conn();
    let token = db::find_token(&conn, &claims.jti)?.ok_or_else(|| ApiError::Unauthorized("token unknown".into()))?;
    if token.revoked {
        return Err(ApiError::Unauthorized("token revoked".into()));
    }
    if token.expires_at < chrono::Utc::now().timestamp() {
        return Err(ApiError::Unauthorized("token expired".into()));
    }
    if !db::session_is_active(&conn, &token.session_id)? {
        return Err(ApiError::Unauthorized("session terminated".into()));
    }
    db::touch_session(&conn, &token.session_id)?;

    let user = db::find_user_by_username(&conn, &claims.sub)?.ok_or_else(|| ApiError::Unauthorized("user gone".into()))?;
    Ok(AuthClaims { username: user.username, session_id: token.session_id, jti: claims.jti, is_admin: user.is_admin })
}

pub fn logout_session(db: &Db, claims: &AuthClaims) -> ApiResult<()> {
    let conn = db.conn();
    db::terminate_session(&conn, &claims.session_id, "logout")?;
    db::revoke_session_tokens(&conn, &claims.session_id)
}

pub fn logout_all(db: &Db, events: &EventBus, username: &str, reason: &str) -> ApiResult<()> {
    let conn = db.conn();
    let sessions = db::terminate_all_sessions_for_user(&conn, username, reason)?;
    for sid in sessions {
        db::revoke_session_tokens(&conn, &sid)?;
    }
    events.publish(ChatEvent::ForceLogout { username: username.to_string(), reason: reason.to_string() });
    Ok(())
}

/// Background idle sweep: terminate sessions whose last activity predates
/// the idle cutoff and emit `ForceLogout` for each affected user.
pub fn sweep_idle_sessions(db: &Db, events: &EventBus, cfg: &AppConfig) -> ApiResult<usize> {
    let conn = db.conn();
    let cutoff = (chrono::Utc::now() - chrono::Duration::seconds(cfg.idle_logout_secs)).to_rfc3339();
    let idle = db::find_idle_sessions(&conn, &cutoff)?;
    for (session_id, username) in &idle {
        db::terminate_session(&conn, session_id, "idle_timeout")?;
        db::revoke_session_tokens(&conn, session_id)?;
        events.publish(ChatEvent::ForceLogout { username: username.clone(), reason: "idle_timeout".to_string() });
    }
    Ok(idle.len())
}

pub fn spawn_idle_sweep(db: std::sync::Arc<Db>, events: std::sync::Arc<EventBus>, cfg: AppConfig) {
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        loop {
            match sweep_idle_sessions(&db, &events, &cfg) {
                Ok(n) if n > 0 => println!("⏱️  idle sweep: terminated {n} session(s)"),
                Ok(_) => {}
                Err(e) => eprintln!("⚠️  idle sweep failed: {e}"),
            }
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        }
    });
}
