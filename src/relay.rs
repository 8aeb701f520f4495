//! Ciphertext Relay (spec §4.3-4.4). Server-side routing of DM, room and
//! group sends; the server stores and forwards opaque envelopes and never
//! inspects plaintext. Mirrors the teacher's `routes/dm.rs`/`routes/rooms.rs`
//! send paths, generalized to branch on recipient presence for DMs.

use crate::config::AppConfig;
use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::events::{ChatEvent, EventBus};
use crate::models::{
    ChatMessage, FetchOfflineQuery, HistoryPage, HistoryQuery, MessageReactions,
    MissedPmSummaryEntry, OfflineMessageOut, ReactRequest, ALLOWED_REACTIONS, CIPHERTEXT_PLACEHOLDER,
};
use crate::policy;
use crate::registry::ConnectionRegistry;

/// Exactly one of `message`/`cipher` must be present on a send (spec §4.3).
fn require_exactly_one_payload(message: Option<&str>, cipher: Option<&str>) -> ApiResult<()> {
    if message.is_some() == cipher.is_some() {
        return Err(ApiError::BadInput("exactly one of message or cipher must be present".into()));
    }
    Ok(())
}

/// Send a direct message. If the recipient has a live connection the
/// envelope is pushed immediately over their event stream; otherwise it is
/// spooled to `offline_messages` for later drain. A block in either
/// direction fails the send before either path is taken.
pub fn send_dm(
    db: &Db,
    events: &EventBus,
    registry: &ConnectionRegistry,
    sender: &str,
    to: &str,
    cipher: &str,
) -> ApiResult<()> {
    let conn = db.conn();
    if db::find_user_by_username(&conn, to)?.is_none() {
        return Err(ApiError::NotFound(format!("user '{to}' not found")));
    }
    if db::is_blocked(&conn, to, sender)? || db::is_blocked(&conn, sender, to)? {
        return Err(ApiError::Forbidden("messaging is blocked between these users".into()));
    }

    if registry.user_has_connection(to) {
        events.publish(ChatEvent::PrivateMessage { to: to.to_string(), sender: sender.to_string(), cipher: cipher.to_string() });
    } else {
        db::spool_message(&conn, to, sender, cipher)?;
        events.publish(ChatEvent::MissedPmSummaryChanged { to: to.to_string() });
    }
    Ok(())
}

/// Drain (or peek) the offline spool from one sender. Draining clears the
/// affected rows atomically with the read, so a crash between fetch and ack
/// cannot duplicate delivery on the next call.
pub fn fetch_offline_pms(db: &Db, recipient: &str, query: &FetchOfflineQuery) -> ApiResult<Vec<OfflineMessageOut>> {
    let conn = db.conn();
    db::fetch_offline(&conn, recipient, &query.from_user, query.peek)
}

pub fn get_missed_pm_summary(db: &Db, recipient: &str) -> ApiResult<Vec<MissedPmSummaryEntry>> {
    let conn = db.conn();
    db::missed_pm_summary(&conn, recipient)
}

/// Send a room message after policy enforcement (membership, lock,
/// read-only, slowmode), recording the post time for slowmode bookkeeping.
/// `cipher` is opaque to the server end to end; when present, `message` is
/// persisted and broadcast as a fixed placeholder instead of being left
/// blank, so legacy consumers that only read `message` degrade gracefully.
pub fn send_room_message(
    db: &Db,
    events: &EventBus,
    cfg: &AppConfig,
    room_name: &str,
    author: &str,
    message: Option<&str>,
    cipher: Option<&str>,
) -> ApiResult<ChatMessage> {
    require_exactly_one_payload(message, cipher)?;
    let conn = db.conn();
    let room = db::find_room_by_name(&conn, room_name)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    policy::enforce_send_policy(&conn, &room, author)?;

    // Content heuristics (spec §4.6 layer 3) apply only to plaintext rooms;
    // a ciphertext envelope is never inspected.
    if let Some(text) = message {
        check_plaintext_content(cfg, &conn, &room.id, author, text)?;
    }

    let stored_message = if cipher.is_some() { Some(CIPHERTEXT_PLACEHOLDER) } else { message };
    let msg = db::insert_message(&conn, "room", &room.id, author, stored_message, cipher)?;
    db::record_post(&conn, &room.id, author)?;
    events.publish(ChatEvent::ChatMessage(msg.clone()));
    Ok(msg)
}

/// Duplicate-message suppression and link/magnet/mention caps. Never
/// applied to ciphertext envelopes, since the server cannot and must not
/// read them (spec §4.6).
fn check_plaintext_content(cfg: &AppConfig, conn: &rusqlite::Connection, room_id: &str, author: &str, text: &str) -> ApiResult<()> {
    let link_count = text.matches("http://").count() + text.matches("https://").count() + text.matches("magnet:").count();
    if link_count > cfg.content_max_links {
        return Err(ApiError::BadInput(format!(
            "message contains {link_count} links, limit is {}",
            cfg.content_max_links
        )));
    }
    let mention_count = text.split_whitespace().filter(|w| w.starts_with('@') && w.len() > 1).count();
    if mention_count > cfg.content_max_mentions {
        return Err(ApiError::BadInput(format!(
            "message contains {mention_count} mentions, limit is {}",
            cfg.content_max_mentions
        )));
    }
    if let Some((last_text, last_at)) = db::last_plaintext_message(conn, room_id, author)?
        && last_text == text
        && let Ok(last_ts) = chrono::DateTime::parse_from_rfc3339(&last_at)
    {
        let elapsed = chrono::Utc::now().signed_duration_since(last_ts).num_seconds();
        if elapsed < cfg.content_duplicate_window_secs {
            return Err(ApiError::BadInput("duplicate message suppressed".into()));
        }
    }
    Ok(())
}

pub fn send_group_message(
    db: &Db,
    events: &EventBus,
    group_id: i64,
    author: &str,
    message: Option<&str>,
    cipher: Option<&str>,
) -> ApiResult<ChatMessage> {
    require_exactly_one_payload(message, cipher)?;
    let conn = db.conn();
    if !db::is_group_member(&conn, group_id, author)? {
        return Err(ApiError::NotInRoom);
    }
    let stored_message = if cipher.is_some() { Some(CIPHERTEXT_PLACEHOLDER) } else { message };
    let msg = db::insert_message(&conn, "group", &group_id.to_string(), author, stored_message, cipher)?;
    events.publish(ChatEvent::ChatMessage(msg.clone()));
    Ok(msg)
}

/// Paginated scope history. `before_id` anchors on that message's sequence
/// number; an unknown id is treated as "no anchor" rather than an error, so
/// a client racing a deletion still gets a page back.
pub fn history(db: &Db, scope: &str, scope_id: &str, default_limit: i64, query: &HistoryQuery) -> ApiResult<HistoryPage> {
    let conn = db.conn();
    let limit = query.limit.unwrap_or(default_limit).clamp(1, 500);

    match &query.before_id {
        None => {
            let messages = db::recent_history(&conn, scope, scope_id, limit)?;
            Ok(HistoryPage { has_more: messages.len() as i64 == limit, messages })
        }
        Some(before_id) => {
            let anchor_seq = db::find_message(&conn, before_id)?.map(|m| m.seq);
            match anchor_seq {
                Some(seq) => {
                    let (messages, has_more) = db::history_before(&conn, scope, scope_id, seq, limit)?;
                    Ok(HistoryPage { messages, has_more })
                }
                None => {
                    let messages = db::recent_history(&conn, scope, scope_id, limit)?;
                    Ok(HistoryPage { has_more: messages.len() as i64 == limit, messages })
                }
            }
        }
    }
}

/// Add a reaction. Reactions are insert-once: a second reaction attempt by
/// the same user on the same message is rejected rather than toggled or
/// overwritten, per the spec's finality requirement.
pub fn react_to_message(db: &Db, events: &EventBus, username: &str, req: &ReactRequest) -> ApiResult<MessageReactions> {
    if !ALLOWED_REACTIONS.contains(&req.emoji.as_str()) {
        return Err(ApiError::BadInput(format!("'{}' is not an allowed reaction", req.emoji)));
    }
    let conn = db.conn();
    let room = db::find_room_by_name(&conn, &req.room)?.ok_or_else(|| ApiError::NotFound("room not found".into()))?;
    if db::member_role(&conn, &room.id, username)?.is_none() {
        return Err(ApiError::NotInRoom);
    }
    if db::find_message(&conn, &req.message_id)?.is_none() {
        return Err(ApiError::NotFound("message not found".into()));
    }

    let inserted = db::try_add_reaction(&conn, &req.message_id, username, &req.emoji)?;
    if !inserted {
        return Err(ApiError::ReactionFinal);
    }

    let counts = db::reaction_counts(&conn, &req.message_id)?;
    let payload = MessageReactions { room: req.room.clone(), message_id: req.message_id.clone(), counts };
    events.publish(ChatEvent::Reactions(payload.clone()));
    Ok(payload)
}
