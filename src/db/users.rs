use super::ci;
use crate::error::{ApiError, ApiResult};
use crate::models::UserRecord;
use rusqlite::{params, OptionalExtension};

pub fn insert_user(conn: &rusqlite::Connection, rec: &UserRecord) -> ApiResult<()> {
    let roles = serde_json::to_string(&rec.roles).unwrap_or_else(|_| "[]".to_string());
    let res = conn.execute(
        "INSERT INTO users (username, username_ci, email, email_ci, password_hash,
            recovery_pin_hash, public_key, encrypted_private_key, is_admin, roles,
            lockout_count, locked_until, last_login_at, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
        params![
            rec.username,
            rec.username_ci,
            rec.email,
            rec.email_ci,
            rec.password_hash,
            rec.recovery_pin_hash,
            rec.public_key,
            rec.encrypted_private_key,
            rec.is_admin as i64,
            roles,
            rec.lockout_count,
            rec.locked_until,
            rec.last_login_at,
            rec.created_at,
        ],
    );
    match res {
        Ok(_) => Ok(()),
        Err(e) if e.to_string().contains("UNIQUE") => {
            Err(ApiError::Conflict("username or email already registered".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<UserRecord> {
    let roles_str: String = row.get(9)?;
    Ok(UserRecord {
        username: row.get(0)?,
        username_ci: row.get(1)?,
        email: row.get(2)?,
        email_ci: row.get(3)?,
        password_hash: row.get(4)?,
        recovery_pin_hash: row.get(5)?,
        public_key: row.get(6)?,
        encrypted_private_key: row.get(7)?,
        is_admin: row.get::<_, i64>(8)? != 0,
        roles: serde_json::from_str(&roles_str).unwrap_or_default(),
        lockout_count: row.get::<_, i64>(10)? as u32,
        locked_until: row.get(11)?,
        last_login_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

const USER_COLUMNS: &str = "username, username_ci, email, email_ci, password_hash,
    recovery_pin_hash, public_key, encrypted_private_key, is_admin, roles,
    lockout_count, locked_until, last_login_at, created_at";

pub fn find_user_by_username(
    conn: &rusqlite::Connection,
    username: &str,
) -> ApiResult<Option<UserRecord>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username_ci = ?1");
    conn.query_row(&sql, params![ci(username)], row_to_user)
        .optional()
        .map_err(ApiError::from)
}

pub fn find_user_public_key(conn: &rusqlite::Connection, username: &str) -> ApiResult<Option<String>> {
    conn.query_row(
        "SELECT public_key FROM users WHERE username_ci = ?1",
        params![ci(username)],
        |r| r.get(0),
    )
    .optional()
    .map_err(ApiError::from)
}

pub fn record_lockout_failure(
    conn: &rusqlite::Connection,
    username: &str,
    attempts: u32,
    lockout_window_secs: i64,
) -> ApiResult<()> {
    let user = find_user_by_username(conn, username)?;
    let Some(user) = user else { return Ok(()) };
    let new_count = user.lockout_count + 1;
    if new_count >= attempts {
        let locked_until = chrono::Utc::now().timestamp() + lockout_window_secs;
        conn.execute(
            "UPDATE users SET lockout_count = 0, locked_until = ?1 WHERE username_ci = ?2",
            params![locked_until, ci(username)],
        )?;
    } else {
        conn.execute(
            "UPDATE users SET lockout_count = ?1 WHERE username_ci = ?2",
            params![new_count, ci(username)],
        )?;
    }
    Ok(())
}

pub fn reset_lockout_and_record_login(conn: &rusqlite::Connection, username: &str) -> ApiResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE users SET lockout_count = 0, locked_until = NULL, last_login_at = ?1 WHERE username_ci = ?2",
        params![now, ci(username)],
    )?;
    Ok(())
}
