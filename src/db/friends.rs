use crate::error::ApiResult;
use rusqlite::{params, OptionalExtension};

fn pair(a: &str, b: &str) -> (String, String) {
    if a.to_lowercase() <= b.to_lowercase() {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

pub fn is_blocked(conn: &rusqlite::Connection, blocker: &str, blocked: &str) -> ApiResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM blocks WHERE blocker = ?1 AND blocked = ?2",
            params![blocker, blocked],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub fn block_user(conn: &rusqlite::Connection, blocker: &str, blocked: &str) -> ApiResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO blocks (blocker, blocked, created_at) VALUES (?1,?2,?3)",
        params![blocker, blocked, now],
    )?;
    Ok(())
}

pub fn unblock_user(conn: &rusqlite::Connection, blocker: &str, blocked: &str) -> ApiResult<()> {
    conn.execute(
        "DELETE FROM blocks WHERE blocker = ?1 AND blocked = ?2",
        params![blocker, blocked],
    )?;
    Ok(())
}

pub fn send_friend_request(conn: &rusqlite::Connection, from: &str, to: &str) -> ApiResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO friend_requests (from_user, to_user, created_at) VALUES (?1,?2,?3)",
        params![from, to, now],
    )?;
    Ok(())
}

pub fn accept_friend_request(conn: &rusqlite::Connection, from: &str, to: &str) -> ApiResult<bool> {
    let existed = conn.execute(
        "DELETE FROM friend_requests WHERE from_user = ?1 AND to_user = ?2",
        params![from, to],
    )?;
    if existed == 0 {
        return Ok(false);
    }
    let (a, b) = pair(from, to);
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO friendships (user_a, user_b, created_at) VALUES (?1,?2,?3)",
        params![a, b, now],
    )?;
    Ok(true)
}

pub fn reject_friend_request(conn: &rusqlite::Connection, from: &str, to: &str) -> ApiResult<()> {
    conn.execute(
        "DELETE FROM friend_requests WHERE from_user = ?1 AND to_user = ?2",
        params![from, to],
    )?;
    Ok(())
}

pub fn are_friends(conn: &rusqlite::Connection, a: &str, b: &str) -> ApiResult<bool> {
    let (x, y) = pair(a, b);
    Ok(conn
        .query_row(
            "SELECT 1 FROM friendships WHERE user_a = ?1 AND user_b = ?2",
            params![x, y],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub fn list_friends(conn: &rusqlite::Connection, username: &str) -> ApiResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT user_a, user_b FROM friendships WHERE user_a = ?1 OR user_b = ?1",
    )?;
    let rows: Vec<String> = stmt
        .query_map(params![username], |r| {
            let a: String = r.get(0)?;
            let b: String = r.get(1)?;
            Ok(if a.eq_ignore_ascii_case(username) { b } else { a })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn pending_requests_for(conn: &rusqlite::Connection, to_user: &str) -> ApiResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT from_user FROM friend_requests WHERE to_user = ?1")?;
    let rows = stmt
        .query_map(params![to_user], |r| r.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
