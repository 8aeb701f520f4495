use crate::error::ApiResult;
use crate::models::ChatMessage;
use rusqlite::params;

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        scope: row.get(1)?,
        scope_id: row.get(2)?,
        author: row.get(3)?,
        message: row.get(4)?,
        cipher: row.get(5)?,
        timestamp: row.get(6)?,
        seq: row.get(7)?,
    })
}

const MESSAGE_COLUMNS: &str = "id, scope, scope_id, author, message, cipher, created_at, seq";

pub fn next_seq(conn: &rusqlite::Connection) -> ApiResult<i64> {
    Ok(conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM messages", [], |r| r.get(0))?)
}

pub fn insert_message(
    conn: &rusqlite::Connection,
    scope: &str,
    scope_id: &str,
    author: &str,
    message: Option<&str>,
    cipher: Option<&str>,
) -> ApiResult<ChatMessage> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let seq = next_seq(conn)?;
    conn.execute(
        &format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)"),
        params![id, scope, scope_id, author, message, cipher, now, seq],
    )?;
    Ok(ChatMessage {
        id,
        scope: scope.to_string(),
        scope_id: scope_id.to_string(),
        author: author.to_string(),
        message: message.map(String::from),
        cipher: cipher.map(String::from),
        timestamp: now,
        seq,
    })
}

/// Most recent plaintext message a given author posted in a room, for the
/// Anti-abuse Governor's duplicate-message heuristic (spec §4.6, plaintext
/// rooms only — a ciphertext message has no `message` text to compare).
pub fn last_plaintext_message(
    conn: &rusqlite::Connection,
    room_id: &str,
    author: &str,
) -> ApiResult<Option<(String, String)>> {
    use rusqlite::OptionalExtension;
    conn.query_row(
        "SELECT message, created_at FROM messages
         WHERE scope = 'room' AND scope_id = ?1 AND author = ?2
           AND message IS NOT NULL AND cipher IS NULL
         ORDER BY seq DESC LIMIT 1",
        params![room_id, author],
        |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
    )
    .optional()
    .map_err(Into::into)
}

pub fn find_message(conn: &rusqlite::Connection, id: &str) -> ApiResult<Option<ChatMessage>> {
    use rusqlite::OptionalExtension;
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_message).optional().map_err(Into::into)
}

/// Most recent `limit` messages for a scope, oldest-first.
pub fn recent_history(
    conn: &rusqlite::Connection,
    scope: &str,
    scope_id: &str,
    limit: i64,
) -> ApiResult<Vec<ChatMessage>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE scope = ?1 AND scope_id = ?2 ORDER BY seq DESC LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows: Vec<ChatMessage> = stmt
        .query_map(params![scope, scope_id, limit], row_to_message)?
        .filter_map(|r| r.ok())
        .collect();
    rows.reverse();
    Ok(rows)
}

/// A page of strictly-older messages before `before_seq`, oldest-first within the page.
pub fn history_before(
    conn: &rusqlite::Connection,
    scope: &str,
    scope_id: &str,
    before_seq: i64,
    limit: i64,
) -> ApiResult<(Vec<ChatMessage>, bool)> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE scope = ?1 AND scope_id = ?2 AND seq < ?3 ORDER BY seq DESC LIMIT ?4"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows: Vec<ChatMessage> = stmt
        .query_map(params![scope, scope_id, before_seq, limit + 1], row_to_message)?
        .filter_map(|r| r.ok())
        .collect();
    let has_more = rows.len() as i64 > limit;
    if has_more {
        rows.truncate(limit as usize);
    }
    rows.reverse();
    Ok((rows, has_more))
}
