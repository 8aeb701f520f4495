use crate::error::ApiResult;
use crate::models::{MissedPmSummaryEntry, OfflineMessageOut};
use rusqlite::params;

pub fn spool_message(conn: &rusqlite::Connection, recipient: &str, sender: &str, cipher: &str) -> ApiResult<()> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO offline_messages (id, recipient, sender, cipher, created_at) VALUES (?1,?2,?3,?4,?5)",
        params![id, recipient, sender, cipher, now],
    )?;
    Ok(())
}

/// Peek or drain the spool for `recipient` from `sender`, ascending by time.
/// When `peek` is false, drained rows are deleted atomically with the read.
pub fn fetch_offline(
    conn: &rusqlite::Connection,
    recipient: &str,
    sender: &str,
    peek: bool,
) -> ApiResult<Vec<OfflineMessageOut>> {
    let mut stmt = conn.prepare(
        "SELECT id, cipher, created_at FROM offline_messages
         WHERE recipient = ?1 AND sender = ?2 AND delivered_at IS NULL
         ORDER BY created_at ASC",
    )?;
    let rows: Vec<OfflineMessageOut> = stmt
        .query_map(params![recipient, sender], |r| {
            Ok(OfflineMessageOut { id: r.get(0)?, cipher: r.get(1)?, ts: r.get(2)? })
        })?
        .filter_map(|r| r.ok())
        .collect();
    drop(stmt);

    if !peek && !rows.is_empty() {
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "DELETE FROM offline_messages WHERE id IN ({})",
            placeholders.join(",")
        );
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            ids.iter().map(|s| s as &dyn rusqlite::types::ToSql).collect();
        conn.execute(&sql, params_refs.as_slice())?;
    }
    Ok(rows)
}

pub fn missed_pm_summary(conn: &rusqlite::Connection, recipient: &str) -> ApiResult<Vec<MissedPmSummaryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT sender, COUNT(*) FROM offline_messages
         WHERE recipient = ?1 AND delivered_at IS NULL
         GROUP BY sender ORDER BY MIN(created_at) ASC",
    )?;
    let rows = stmt
        .query_map(params![recipient], |r| {
            Ok(MissedPmSummaryEntry { sender: r.get(0)?, count: r.get(1)? })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn has_any_spooled(conn: &rusqlite::Connection, recipient: &str) -> ApiResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM offline_messages WHERE recipient = ?1 AND delivered_at IS NULL)",
        params![recipient],
        |r| r.get(0),
    )?)
}
