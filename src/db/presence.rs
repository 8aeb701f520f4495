use crate::error::ApiResult;
use crate::models::PresenceSnapshot;
use rusqlite::{params, OptionalExtension};

pub fn upsert_presence(
    conn: &rusqlite::Connection,
    username: &str,
    state: &str,
    custom_status: Option<&str>,
) -> ApiResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO presence (username, state, custom_status, last_seen) VALUES (?1,?2,?3,?4)
         ON CONFLICT(username) DO UPDATE SET state = excluded.state,
            custom_status = COALESCE(excluded.custom_status, presence.custom_status),
            last_seen = excluded.last_seen",
        params![username, state, custom_status, now],
    )?;
    Ok(())
}

pub fn get_presence(conn: &rusqlite::Connection, username: &str) -> ApiResult<Option<PresenceSnapshot>> {
    conn.query_row(
        "SELECT username, state, custom_status, last_seen FROM presence WHERE username = ?1",
        params![username],
        |r| {
            Ok(PresenceSnapshot {
                user: r.get(0)?,
                presence: r.get(1)?,
                custom_status: r.get(2)?,
                last_seen: r.get(3)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}
