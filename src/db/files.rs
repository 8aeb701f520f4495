use crate::error::{ApiError, ApiResult};
use crate::models::{EncryptedFileMeta, UploadEncryptedFileRequest};
use rusqlite::{params, OptionalExtension};

pub fn insert_blob(
    conn: &rusqlite::Connection,
    owner: &str,
    req: &UploadEncryptedFileRequest,
    ciphertext: &[u8],
) -> ApiResult<EncryptedFileMeta> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO file_blobs (id, owner, scope, iv, sha256, ciphertext, size, mime_hint, created_at, ref_count)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,1)",
        params![id, owner, req.scope, req.iv, req.sha256, ciphertext, ciphertext.len() as i64, req.mime_hint, now],
    )?;
    for (user, key) in &req.wrapped_keys {
        conn.execute(
            "INSERT INTO file_blob_keys (file_id, username, wrapped_key) VALUES (?1,?2,?3)",
            params![id, user, key],
        )?;
    }
    Ok(EncryptedFileMeta {
        id,
        owner: owner.to_string(),
        scope: req.scope.clone(),
        iv: req.iv.clone(),
        sha256: req.sha256.clone(),
        size: ciphertext.len() as i64,
        mime_hint: req.mime_hint.clone(),
        created_at: now,
    })
}

fn row_to_meta(row: &rusqlite::Row) -> rusqlite::Result<EncryptedFileMeta> {
    Ok(EncryptedFileMeta {
        id: row.get(0)?,
        owner: row.get(1)?,
        scope: row.get(2)?,
        iv: row.get(3)?,
        sha256: row.get(4)?,
        size: row.get(5)?,
        mime_hint: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn find_blob_meta(conn: &rusqlite::Connection, id: &str) -> ApiResult<Option<EncryptedFileMeta>> {
    conn.query_row(
        "SELECT id, owner, scope, iv, sha256, size, mime_hint, created_at FROM file_blobs WHERE id = ?1",
        params![id],
        row_to_meta,
    )
    .optional()
    .map_err(Into::into)
}

pub fn find_blob_bytes(conn: &rusqlite::Connection, id: &str, requester: &str) -> ApiResult<Option<Vec<u8>>> {
    let can_read: bool = conn
        .query_row(
            "SELECT 1 FROM file_blobs WHERE id = ?1 AND owner = ?2
             UNION SELECT 1 FROM file_blob_keys WHERE file_id = ?1 AND username = ?2",
            params![id, requester],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !can_read {
        return Err(ApiError::Forbidden("not a recipient of this file".into()));
    }
    conn.query_row("SELECT ciphertext FROM file_blobs WHERE id = ?1", params![id], |r| r.get(0))
        .optional()
        .map_err(Into::into)
}

/// Garbage-collect blobs with zero references (no message points at them).
pub fn gc_unreferenced_blobs(conn: &rusqlite::Connection) -> ApiResult<i64> {
    let n = conn.execute("DELETE FROM file_blobs WHERE ref_count <= 0", [])?;
    Ok(n as i64)
}
