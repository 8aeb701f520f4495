//! Realtime Event Dispatcher (spec §4.2/§6). One `EventStream` (SSE) per
//! connection, fed by the `EventBus` broadcast channel and filtered to the
//! events this connecting user is entitled to see. Generalizes the
//! teacher's single-room `message_stream` into the spec's full per-scope
//! event surface.

use crate::db::Db;
use crate::events::{ChatEvent, EventBus};
use crate::p2p::TransferRegistry;
use crate::registry::{ConnectionGuard, ConnectionRegistry};
use crate::voice::CallRegistry;
use rocket::response::stream::{Event, EventStream};
use rocket::{get, State};
use std::sync::Arc;
use tokio::time::{interval, Duration};

use super::AuthUser;

/// Connect to the realtime event surface. `rooms` is a comma-separated list
/// of room names to join the live roster for immediately (mirrors the
/// teacher's `sender` query-param-at-connect-time pattern); additional rooms
/// can be joined later over the same connection via the room join routes
/// once the client knows its `conn_id` from the initial `connected` event.
#[get("/api/v1/stream?<rooms>")]
pub fn stream(
    db: &State<Db>,
    events: &State<EventBus>,
    registry: &State<ConnectionRegistry>,
    calls: &State<CallRegistry>,
    transfers: &State<TransferRegistry>,
    user: AuthUser,
    rooms: Option<&str>,
) -> EventStream![] {
    let username = user.0.username.clone();
    let conn_id = uuid::Uuid::new_v4().to_string();
    registry.register(&conn_id, &username);

    let db_conn_rooms: Vec<String> = rooms
        .map(|r| r.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    for room in &db_conn_rooms {
        registry.join_room(&conn_id, room);
    }

    let mut rx = events.sender.subscribe();
    let registry_inner = (*registry).clone();
    let events_arc: Arc<EventBus> = Arc::new(EventBus { sender: events.sender.clone() });
    let calls_inner = (*calls).clone();
    let transfers_inner = (*transfers).clone();

    EventStream! {
        let _guard = ConnectionGuard {
            registry: registry_inner,
            events: events_arc,
            conn_id: conn_id.clone(),
            calls: calls_inner,
            transfers: transfers_inner,
        };

        yield Event::json(&serde_json::json!({"conn_id": conn_id})).event("connected");

        // Replay the missed-PM summary immediately on connect, the same way
        // the teacher replays recent messages on stream open.
        if let Ok(summary) = crate::db::missed_pm_summary(&db.conn(), &username) {
            yield Event::json(&summary).event("missed_pm_summary");
        }

        let mut heartbeat = interval(Duration::from_secs(15));

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Ok(ev) => {
                            if let Some((name, payload)) = route_event(&ev, &username, db) {
                                yield Event::json(&payload).event(name);
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                            yield Event::json(&serde_json::json!({"reason": "lagged"})).event("slow_consumer");
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    yield Event::json(&serde_json::json!({"time": chrono::Utc::now().to_rfc3339()})).event("heartbeat");
                }
            }
        }
    }
}

/// Decide whether `ev` is visible to `username`, and if so, the SSE event
/// name and JSON payload to emit. Named after the spec's Server→Client
/// event surface (§6) so the wire names match the specification verbatim.
fn route_event(ev: &ChatEvent, username: &str, db: &Db) -> Option<(&'static str, serde_json::Value)> {
    match ev {
        ChatEvent::ChatMessage(m) => {
            let conn = db.conn();
            let visible = match m.scope.as_str() {
                "room" => crate::db::member_role(&conn, &m.scope_id, username).ok().flatten().is_some(),
                "group" => m.scope_id.parse::<i64>().ok().map(|gid| crate::db::is_group_member(&conn, gid, username).unwrap_or(false)).unwrap_or(false),
                _ => false,
            };
            visible.then(|| ("chat_message", serde_json::to_value(m).unwrap_or_default()))
        }
        ChatEvent::PrivateMessage { to, sender, cipher } => (to == username).then(|| {
            ("private_message", serde_json::json!({"from": sender, "cipher": cipher}))
        }),
        ChatEvent::MissedPmSummaryChanged { to } => (to == username).then(|| {
            let conn = db.conn();
            let summary = crate::db::missed_pm_summary(&conn, username).unwrap_or_default();
            ("missed_pm_summary", serde_json::to_value(summary).unwrap_or_default())
        }),
        ChatEvent::Reactions(r) => {
            let conn = db.conn();
            let visible = crate::db::find_room_by_name(&conn, &r.room).ok().flatten()
                .map(|room| crate::db::member_role(&conn, &room.id, username).ok().flatten().is_some())
                .unwrap_or(false);
            visible.then(|| ("message_reactions", serde_json::to_value(r).unwrap_or_default()))
        }
        ChatEvent::RoomCreated(r) => Some(("room_list", serde_json::to_value(r).unwrap_or_default())),
        ChatEvent::RoomPolicyChanged(state) => {
            let conn = db.conn();
            let visible = crate::db::find_room_by_name(&conn, &state.room).ok().flatten()
                .map(|room| crate::db::member_role(&conn, &room.id, username).ok().flatten().is_some())
                .unwrap_or(false);
            visible.then(|| ("room_policy_state", serde_json::to_value(state).unwrap_or_default()))
        }
        ChatEvent::RoomForcedLeave(leave) => (leave.user == username).then(|| {
            ("room_forced_leave", serde_json::to_value(leave).unwrap_or_default())
        }),
        // `custom_room_invite` names an invite to a private (user-created)
        // room, `room_invite` a public catalog room, distinguished by the
        // room's own visibility rather than a separate entity.
        ChatEvent::RoomInviteReceived(invite) => (invite.invitee == username).then(|| {
            let conn = db.conn();
            let is_private = crate::db::find_room_by_name(&conn, &invite.room).ok().flatten().map(|r| r.visibility == "private").unwrap_or(false);
            let name = if is_private { "custom_room_invite" } else { "room_invite" };
            (name, serde_json::to_value(invite).unwrap_or_default())
        }),
        ChatEvent::GroupInviteReceived(invite) => (invite.invitee == username).then(|| {
            ("notification", serde_json::json!({"type": "group_invite", "group_id": invite.group_id, "inviter": invite.inviter}))
        }),
        ChatEvent::FriendPresenceUpdate { friend, observer, state } => (observer == username).then(|| {
            ("friend_presence_update", serde_json::json!({"friend": friend, "state": state}))
        }),
        ChatEvent::FriendRequestReceived { to, from } => (to == username).then(|| {
            ("friend_request", serde_json::json!({"from": from}))
        }),
        ChatEvent::FriendRequestAccepted { to, by } => (to == username).then(|| {
            ("friend_request_accepted", serde_json::json!({"by": by}))
        }),
        ChatEvent::ForceLogout { username: target, reason } => (target == username).then(|| {
            ("force_logout", serde_json::json!({"reason": reason}))
        }),
        ChatEvent::GlobalAnnouncement { message } => Some(("global_announcement", serde_json::json!({"message": message}))),

        ChatEvent::VoiceDmInvite(call) => (call.callee == username).then(|| ("voice_dm_invite", serde_json::to_value(call).unwrap_or_default())),
        ChatEvent::VoiceDmAccept(call) => (call.caller == username || call.callee == username).then(|| ("voice_dm_accept", serde_json::to_value(call).unwrap_or_default())),
        ChatEvent::VoiceDmDecline(call) => (call.caller == username).then(|| ("voice_dm_decline", serde_json::to_value(call).unwrap_or_default())),
        // §4.4's table and §6's server→client mirrors name the SDP relay by
        // direction rather than a single generic event; `kind` is "offer" or
        // "answer" and selects the wire name directly.
        ChatEvent::VoiceDmSdp { to, call_id, kind, sdp } => (to == username).then(|| {
            let name: &'static str = if *kind == "offer" { "voice_dm_offer" } else { "voice_dm_answer" };
            (name, serde_json::json!({"call_id": call_id, "sdp": sdp}))
        }),
        ChatEvent::VoiceDmIce { to, call_id, candidate } => (to == username).then(|| {
            ("voice_dm_ice", serde_json::json!({"call_id": call_id, "candidate": candidate}))
        }),
        ChatEvent::VoiceDmEnd { to, call_id, reason } => (to == username).then(|| {
            ("voice_dm_end", serde_json::json!({"call_id": call_id, "reason": reason}))
        }),

        ChatEvent::VoiceRoomJoined { room: _, user, roster } => (roster.users.contains(&username.to_string()) || user == username).then(|| {
            ("voice_room_user_joined", serde_json::to_value(roster).unwrap_or_default())
        }),
        ChatEvent::VoiceRoomLeft { room, user } => Some(("voice_room_user_left", serde_json::json!({"room": room, "user": user}))),
        // §6's server→client mirrors name the room signal relay by direction
        // ("voice_room_offer"/"voice_room_answer"/"voice_room_ice") rather
        // than a single generic event.
        ChatEvent::VoiceRoomSignal { room: _, to, from, kind, payload } => (to == username).then(|| {
            let name: &'static str = match *kind {
                "offer" => "voice_room_offer",
                "answer" => "voice_room_answer",
                _ => "voice_room_ice",
            };
            (name, serde_json::json!({"from": from, "payload": payload}))
        }),
        ChatEvent::VoiceRoomForcedLeave(leave) => (leave.user == username).then(|| {
            ("voice_room_forced_leave", serde_json::to_value(leave).unwrap_or_default())
        }),

        ChatEvent::P2POffer { to, from, transfer_id, meta } => (to == username).then(|| {
            ("p2p_file_offer", serde_json::json!({"from": from, "transfer_id": transfer_id, "meta": meta}))
        }),
        ChatEvent::P2PAnswer { to, transfer_id, sdp } => (to == username).then(|| {
            ("p2p_file_answer", serde_json::json!({"transfer_id": transfer_id, "sdp": sdp}))
        }),
        ChatEvent::P2PDecline { to, transfer_id } => (to == username).then(|| {
            ("p2p_file_decline", serde_json::json!({"transfer_id": transfer_id}))
        }),
        ChatEvent::P2PIce { to, transfer_id, candidate } => (to == username).then(|| {
            ("p2p_file_ice", serde_json::json!({"transfer_id": transfer_id, "candidate": candidate}))
        }),
        ChatEvent::P2PStatus(status) => (status.sender == username || status.receiver == username).then(|| {
            ("p2p_file_status", serde_json::to_value(status).unwrap_or_default())
        }),
    }
}
