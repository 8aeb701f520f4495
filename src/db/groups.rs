use crate::error::{ApiError, ApiResult};
use crate::models::{Group, GroupInvite, RoomRole};
use rusqlite::{params, OptionalExtension};

pub fn create_group(conn: &rusqlite::Connection, name: &str, owner: &str) -> ApiResult<Group> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO groups (name, owner, created_at) VALUES (?1,?2,?3)",
        params![name, owner, now],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO group_members (group_id, username, role, joined_at) VALUES (?1,?2,?3,?4)",
        params![id, owner, RoomRole::Owner.as_str(), now],
    )?;
    Ok(Group { id, name: name.to_string(), owner: owner.to_string(), created_at: now })
}

pub fn find_group(conn: &rusqlite::Connection, id: i64) -> ApiResult<Option<Group>> {
    conn.query_row(
        "SELECT id, name, owner, created_at FROM groups WHERE id = ?1",
        params![id],
        |r| Ok(Group { id: r.get(0)?, name: r.get(1)?, owner: r.get(2)?, created_at: r.get(3)? }),
    )
    .optional()
    .map_err(Into::into)
}

pub fn is_group_member(conn: &rusqlite::Connection, group_id: i64, username: &str) -> ApiResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM group_members WHERE group_id = ?1 AND username = ?2",
            params![group_id, username],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub fn add_group_member(conn: &rusqlite::Connection, group_id: i64, username: &str) -> ApiResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO group_members (group_id, username, role, joined_at) VALUES (?1,?2,'member',?3)",
        params![group_id, username, now],
    )?;
    Ok(())
}

pub fn group_members(conn: &rusqlite::Connection, group_id: i64) -> ApiResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT username FROM group_members WHERE group_id = ?1")?;
    let rows = stmt
        .query_map(params![group_id], |r| r.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

fn row_to_group_invite(row: &rusqlite::Row) -> rusqlite::Result<GroupInvite> {
    Ok(GroupInvite { id: row.get(0)?, group_id: row.get(1)?, invitee: row.get(2)?, inviter: row.get(3)?, created_at: row.get(4)? })
}

/// Single-use group invite, mirroring `create_room_invite`: re-inviting the
/// same (group, invitee) pair replaces a still-pending prior invite.
pub fn create_group_invite(conn: &rusqlite::Connection, group_id: i64, invitee: &str, inviter: &str) -> ApiResult<GroupInvite> {
    conn.execute(
        "DELETE FROM group_invites WHERE group_id = ?1 AND invitee = ?2 AND consumed_at IS NULL",
        params![group_id, invitee],
    )?;
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO group_invites (id, group_id, invitee, inviter, created_at) VALUES (?1,?2,?3,?4,?5)",
        params![id, group_id, invitee, inviter, now],
    )?;
    Ok(GroupInvite { id, group_id, invitee: invitee.to_string(), inviter: inviter.to_string(), created_at: now })
}

pub fn pending_group_invites_for(conn: &rusqlite::Connection, invitee: &str) -> ApiResult<Vec<GroupInvite>> {
    let mut stmt = conn.prepare(
        "SELECT id, group_id, invitee, inviter, created_at FROM group_invites
         WHERE invitee = ?1 AND consumed_at IS NULL ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![invitee], row_to_group_invite)?.filter_map(|r| r.ok()).collect();
    Ok(rows)
}

pub fn consume_group_invite(conn: &rusqlite::Connection, invite_id: &str, invitee: &str) -> ApiResult<Group> {
    let group_id: Option<i64> = conn
        .query_row(
            "SELECT group_id FROM group_invites WHERE id = ?1 AND invitee = ?2 AND consumed_at IS NULL",
            params![invite_id, invitee],
            |r| r.get(0),
        )
        .optional()?;
    let Some(group_id) = group_id else { return Err(ApiError::NotFound("invite not found".into())) };
    let now = chrono::Utc::now().to_rfc3339();
    let updated = conn.execute(
        "UPDATE group_invites SET consumed_at = ?1 WHERE id = ?2 AND consumed_at IS NULL",
        params![now, invite_id],
    )?;
    if updated == 0 {
        return Err(ApiError::Conflict("invite already consumed".into()));
    }
    add_group_member(conn, group_id, invitee)?;
    find_group(conn, group_id)?.ok_or_else(|| ApiError::NotFound("group not found".into()))
}
