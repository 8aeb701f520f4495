use crate::error::{ApiError, ApiResult};
use crate::models::{CreateRoomRequest, Room, RoomInvite, RoomRole};
use rusqlite::{params, OptionalExtension};

fn row_to_room(row: &rusqlite::Row) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        subcategory: row.get(3)?,
        visibility: row.get(4)?,
        is_18plus: row.get::<_, i64>(5)? != 0,
        is_nsfw: row.get::<_, i64>(6)? != 0,
        created_by: row.get(7)?,
        parent_room: row.get(8)?,
        capacity: row.get(9)?,
        locked: row.get::<_, i64>(10)? != 0,
        readonly: row.get::<_, i64>(11)? != 0,
        slowmode_seconds: row.get(12)?,
        created_at: row.get(13)?,
    })
}

const ROOM_COLUMNS: &str = "id, name, category, subcategory, visibility, is_18plus, is_nsfw,
    created_by, parent_room, capacity, locked, readonly, slowmode_seconds, created_at";

pub fn create_room(conn: &rusqlite::Connection, req: &CreateRoomRequest, created_by: &str) -> ApiResult<Room> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let res = conn.execute(
        "INSERT INTO rooms (id, name, category, subcategory, visibility, is_18plus, is_nsfw, created_by, capacity, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![id, req.name, req.category, req.subcategory, req.visibility, req.is_18plus as i64,
            req.is_nsfw as i64, created_by, req.capacity, now],
    );
    match res {
        Ok(_) => {}
        Err(e) if e.to_string().contains("UNIQUE") => {
            return Err(ApiError::Conflict(format!("room '{}' already exists", req.name)))
        }
        Err(e) => return Err(e.into()),
    }
    add_member(conn, &id, created_by, RoomRole::Owner)?;
    find_room_by_id(conn, &id)?.ok_or_else(|| ApiError::Internal("room vanished after insert".into()))
}

pub fn find_room_by_id(conn: &rusqlite::Connection, id: &str) -> ApiResult<Option<Room>> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_room).optional().map_err(Into::into)
}

pub fn find_room_by_name(conn: &rusqlite::Connection, name: &str) -> ApiResult<Option<Room>> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE name = ?1");
    conn.query_row(&sql, params![name], row_to_room).optional().map_err(Into::into)
}

/// The public room catalog, for `get_rooms`. Sub-rooms created by
/// autoscaling are listed alongside their parent; clients group by
/// `parent_room` if they want to collapse the view.
pub fn list_rooms(conn: &rusqlite::Connection) -> ApiResult<Vec<Room>> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE visibility = 'public' ORDER BY name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_room)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn add_member(conn: &rusqlite::Connection, room_id: &str, username: &str, role: RoomRole) -> ApiResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO room_members (room_id, username, role, joined_at) VALUES (?1,?2,?3,?4)",
        params![room_id, username, role.as_str(), now],
    )?;
    Ok(())
}

pub fn remove_member(conn: &rusqlite::Connection, room_id: &str, username: &str) -> ApiResult<()> {
    conn.execute(
        "DELETE FROM room_members WHERE room_id = ?1 AND username = ?2",
        params![room_id, username],
    )?;
    Ok(())
}

pub fn member_role(conn: &rusqlite::Connection, room_id: &str, username: &str) -> ApiResult<Option<RoomRole>> {
    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM room_members WHERE room_id = ?1 AND username = ?2",
            params![room_id, username],
            |r| r.get(0),
        )
        .optional()?;
    Ok(role.map(|r| RoomRole::from_str(&r)))
}

pub fn member_count(conn: &rusqlite::Connection, room_id: &str) -> ApiResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM room_members WHERE room_id = ?1",
        params![room_id],
        |r| r.get(0),
    )?)
}

pub fn last_post_at(conn: &rusqlite::Connection, room_id: &str, username: &str) -> ApiResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT last_post_at FROM room_members WHERE room_id = ?1 AND username = ?2",
            params![room_id, username],
            |r| r.get(0),
        )
        .optional()?
        .flatten())
}

pub fn record_post(conn: &rusqlite::Connection, room_id: &str, username: &str) -> ApiResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE room_members SET last_post_at = ?1 WHERE room_id = ?2 AND username = ?3",
        params![now, room_id, username],
    )?;
    Ok(())
}

pub fn set_policy(
    conn: &rusqlite::Connection,
    room_id: &str,
    locked: Option<bool>,
    readonly: Option<bool>,
    slowmode_seconds: Option<i64>,
) -> ApiResult<()> {
    if let Some(v) = locked {
        conn.execute("UPDATE rooms SET locked = ?1 WHERE id = ?2", params![v as i64, room_id])?;
    }
    if let Some(v) = readonly {
        conn.execute("UPDATE rooms SET readonly = ?1 WHERE id = ?2", params![v as i64, room_id])?;
    }
    if let Some(v) = slowmode_seconds {
        conn.execute(
            "UPDATE rooms SET slowmode_seconds = ?1 WHERE id = ?2",
            params![v, room_id],
        )?;
    }
    Ok(())
}

/// Find the first sub-room `Name(2)`, `Name(3)`, ... with free capacity, or
/// None if all existing sub-rooms up to `max_subrooms` are full.
pub fn find_open_subroom(
    conn: &rusqlite::Connection,
    parent_name: &str,
    max_subrooms: u32,
) -> ApiResult<Option<Room>> {
    for k in 2..=max_subrooms {
        let name = format!("{parent_name}({k})");
        if let Some(room) = find_room_by_name(conn, &name)? {
            let cap = room.capacity.unwrap_or(i64::MAX);
            let count = member_count(conn, &room.id)?;
            if count < cap {
                return Ok(Some(room));
            }
        } else {
            return Ok(None); // this sub-room slot is free to create
        }
    }
    Ok(None)
}

fn row_to_invite(row: &rusqlite::Row) -> rusqlite::Result<RoomInvite> {
    Ok(RoomInvite {
        id: row.get(0)?,
        room: row.get(1)?,
        invitee: row.get(2)?,
        inviter: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Create a single-use room invite. Re-inviting the same (room, invitee)
/// pair while a prior invite is still unconsumed replaces it, the same way
/// a repeated friend request is idempotent rather than stacking entries.
pub fn create_room_invite(conn: &rusqlite::Connection, room_id: &str, room_name: &str, invitee: &str, inviter: &str) -> ApiResult<RoomInvite> {
    conn.execute(
        "DELETE FROM room_invites WHERE room_id = ?1 AND invitee = ?2 AND consumed_at IS NULL",
        params![room_id, invitee],
    )?;
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO room_invites (id, room_id, invitee, inviter, created_at) VALUES (?1,?2,?3,?4,?5)",
        params![id, room_id, invitee, inviter, now],
    )?;
    Ok(RoomInvite { id, room: room_name.to_string(), invitee: invitee.to_string(), inviter: inviter.to_string(), created_at: now })
}

/// Pending invites addressed to `invitee`, joined to the room name so the
/// caller doesn't need a second lookup per invite.
pub fn pending_room_invites_for(conn: &rusqlite::Connection, invitee: &str) -> ApiResult<Vec<RoomInvite>> {
    let mut stmt = conn.prepare(
        "SELECT ri.id, r.name, ri.invitee, ri.inviter, ri.created_at
         FROM room_invites ri JOIN rooms r ON r.id = ri.room_id
         WHERE ri.invitee = ?1 AND ri.consumed_at IS NULL
         ORDER BY ri.created_at ASC",
    )?;
    let rows = stmt.query_map(params![invitee], row_to_invite)?.filter_map(|r| r.ok()).collect();
    Ok(rows)
}

/// Consume a pending invite for `invitee`, admitting them to the room as a
/// member. Fails closed if the invite is unknown, already consumed, or
/// addressed to someone else — mirrors refresh-token consumption's
/// fail-closed discipline for single-use tokens.
pub fn consume_room_invite(conn: &rusqlite::Connection, invite_id: &str, invitee: &str) -> ApiResult<Room> {
    let room_id: Option<String> = conn
        .query_row(
            "SELECT room_id FROM room_invites WHERE id = ?1 AND invitee = ?2 AND consumed_at IS NULL",
            params![invite_id, invitee],
            |r| r.get(0),
        )
        .optional()?;
    let Some(room_id) = room_id else { return Err(ApiError::NotFound("invite not found".into())) };
    let now = chrono::Utc::now().to_rfc3339();
    let updated = conn.execute(
        "UPDATE room_invites SET consumed_at = ?1 WHERE id = ?2 AND consumed_at IS NULL",
        params![now, invite_id],
    )?;
    if updated == 0 {
        return Err(ApiError::Conflict("invite already consumed".into()));
    }
    add_member(conn, &room_id, invitee, RoomRole::Member)?;
    find_room_by_id(conn, &room_id)?.ok_or_else(|| ApiError::NotFound("room not found".into()))
}

pub fn create_subroom(
    conn: &rusqlite::Connection,
    parent: &Room,
    k: u32,
    created_by: &str,
) -> ApiResult<Room> {
    let name = format!("{}({})", parent.name, k);
    let req = CreateRoomRequest {
        name,
        category: parent.category.clone(),
        subcategory: parent.subcategory.clone(),
        visibility: parent.visibility.clone(),
        is_18plus: parent.is_18plus,
        is_nsfw: parent.is_nsfw,
        capacity: parent.capacity,
    };
    let room = create_room(conn, &req, created_by)?;
    conn.execute(
        "UPDATE rooms SET parent_room = ?1 WHERE id = ?2",
        params![parent.name, room.id],
    )?;
    find_room_by_id(conn, &room.id)?.ok_or_else(|| ApiError::Internal("subroom vanished".into()))
}
