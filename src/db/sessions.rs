use crate::error::ApiResult;
use rusqlite::{params, OptionalExtension};

pub fn create_session(conn: &rusqlite::Connection, username: &str, fingerprint: Option<&str>) -> ApiResult<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO auth_sessions (id, username, created_at, last_activity_at, fingerprint) VALUES (?1,?2,?3,?3,?4)",
        params![id, username, now, fingerprint],
    )?;
    Ok(id)
}

pub fn session_is_active(conn: &rusqlite::Connection, session_id: &str) -> ApiResult<bool> {
    let terminated: Option<String> = conn
        .query_row(
            "SELECT terminated_at FROM auth_sessions WHERE id = ?1",
            params![session_id],
            |r| r.get(0),
        )
        .optional()?
        .unwrap_or(None);
    Ok(terminated.is_none())
}

pub fn touch_session(conn: &rusqlite::Connection, session_id: &str) -> ApiResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE auth_sessions SET last_activity_at = ?1 WHERE id = ?2 AND terminated_at IS NULL",
        params![now, session_id],
    )?;
    Ok(())
}

pub fn terminate_session(conn: &rusqlite::Connection, session_id: &str, reason: &str) -> ApiResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE auth_sessions SET terminated_at = ?1, termination_reason = ?2 WHERE id = ?3 AND terminated_at IS NULL",
        params![now, reason, session_id],
    )?;
    Ok(())
}

pub fn terminate_all_sessions_for_user(conn: &rusqlite::Connection, username: &str, reason: &str) -> ApiResult<Vec<String>> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut stmt = conn.prepare(
        "SELECT id FROM auth_sessions WHERE username = ?1 AND terminated_at IS NULL",
    )?;
    let ids: Vec<String> = stmt
        .query_map(params![username], |r| r.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    drop(stmt);
    conn.execute(
        "UPDATE auth_sessions SET terminated_at = ?1, termination_reason = ?2 WHERE username = ?3 AND terminated_at IS NULL",
        params![now, reason, username],
    )?;
    Ok(ids)
}

/// Sessions whose last activity is older than the idle cutoff and are still active.
pub fn find_idle_sessions(conn: &rusqlite::Connection, cutoff_rfc3339: &str) -> ApiResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT id, username FROM auth_sessions WHERE terminated_at IS NULL AND last_activity_at < ?1",
    )?;
    let rows = stmt
        .query_map(params![cutoff_rfc3339], |r| Ok((r.get(0)?, r.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

// --- Tokens ---

pub struct TokenRow {
    pub jti: String,
    pub session_id: String,
    pub kind: String,
    pub expires_at: i64,
    pub revoked: bool,
    pub consumed: bool,
}

pub fn insert_token(
    conn: &rusqlite::Connection,
    jti: &str,
    session_id: &str,
    kind: &str,
    issued_at: i64,
    expires_at: i64,
    parent_jti: Option<&str>,
) -> ApiResult<()> {
    conn.execute(
        "INSERT INTO auth_tokens (jti, session_id, kind, issued_at, expires_at, parent_jti) VALUES (?1,?2,?3,?4,?5,?6)",
        params![jti, session_id, kind, issued_at, expires_at, parent_jti],
    )?;
    Ok(())
}

pub fn find_token(conn: &rusqlite::Connection, jti: &str) -> ApiResult<Option<TokenRow>> {
    conn.query_row(
        "SELECT jti, session_id, kind, expires_at, revoked, consumed FROM auth_tokens WHERE jti = ?1",
        params![jti],
        |r| {
            Ok(TokenRow {
                jti: r.get(0)?,
                session_id: r.get(1)?,
                kind: r.get(2)?,
                expires_at: r.get(3)?,
                revoked: r.get::<_, i64>(4)? != 0,
                consumed: r.get::<_, i64>(5)? != 0,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

/// Mark a refresh token consumed. Returns false if it was already consumed
/// (lost the race) so the caller can report `Conflict`.
pub fn consume_refresh_token_once(conn: &rusqlite::Connection, jti: &str) -> ApiResult<bool> {
    let updated = conn.execute(
        "UPDATE auth_tokens SET consumed = 1 WHERE jti = ?1 AND consumed = 0 AND kind = 'refresh'",
        params![jti],
    )?;
    Ok(updated == 1)
}

pub fn revoke_session_tokens(conn: &rusqlite::Connection, session_id: &str) -> ApiResult<()> {
    conn.execute(
        "UPDATE auth_tokens SET revoked = 1 WHERE session_id = ?1",
        params![session_id],
    )?;
    Ok(())
}
