use crate::error::ApiResult;
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;

/// Insert a reaction iff the user has not already reacted to this message.
/// Returns `true` if inserted, `false` if the user already has a (possibly
/// different) reaction recorded — reactions are final and non-revocable.
pub fn try_add_reaction(
    conn: &rusqlite::Connection,
    message_id: &str,
    username: &str,
    emoji: &str,
) -> ApiResult<bool> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT emoji FROM message_reactions WHERE message_id = ?1 AND username = ?2",
            params![message_id, username],
            |r| r.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Ok(false);
    }
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO message_reactions (message_id, username, emoji, created_at) VALUES (?1,?2,?3,?4)",
        params![message_id, username, emoji, now],
    )?;
    Ok(true)
}

pub fn reaction_counts(conn: &rusqlite::Connection, message_id: &str) -> ApiResult<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare(
        "SELECT emoji, COUNT(*) FROM message_reactions WHERE message_id = ?1 GROUP BY emoji",
    )?;
    let rows = stmt
        .query_map(params![message_id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
