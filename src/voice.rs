//! WebRTC signaling relay for voice (spec §4.7). The server never touches
//! media; it only relays SDP/ICE and enforces the call/roster state
//! machines. DM call state is short-lived and kept in memory, the same way
//! `registry.rs` keeps voice-room rosters in memory rather than in SQLite.

use crate::error::{ApiError, ApiResult};
use crate::events::{ChatEvent, EventBus};
use crate::models::{CallState, DmCall};
use crate::registry::ConnectionRegistry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Cheap to clone: the map lives behind an `Arc`, the same way
/// `TransferRegistry` shares its inner state across clones so a dropped
/// connection's cleanup and the request handlers operate on one call table.
#[derive(Default, Clone)]
pub struct CallRegistry {
    calls: Arc<RwLock<HashMap<String, DmCall>>>,
}

impl CallRegistry {
    fn valid_transition(from: CallState, to: CallState) -> bool {
        matches!(
            (from, to),
            (CallState::Ringing, CallState::Accepted)
                | (CallState::Ringing, CallState::Ended)
                | (CallState::Accepted, CallState::Active)
                | (CallState::Accepted, CallState::Ended)
                | (CallState::Active, CallState::Ended)
        )
    }

    fn find(&self, call_id: &str) -> Option<DmCall> {
        self.calls.read().unwrap().get(call_id).cloned()
    }

    fn transition(&self, call_id: &str, to: CallState) -> ApiResult<DmCall> {
        let mut calls = self.calls.write().unwrap();
        let call = calls.get_mut(call_id).ok_or_else(|| ApiError::NotFound("call not found".into()))?;
        let from = CallState::from_str_lossy(&call.state);
        if !Self::valid_transition(from, to) {
            return Err(ApiError::CallStateError(format!("cannot move call from {} to {}", call.state, to.as_str())));
        }
        call.state = to.as_str().to_string();
        Ok(call.clone())
    }

    fn participant(&self, call_id: &str, username: &str) -> ApiResult<DmCall> {
        let call = self.find(call_id).ok_or_else(|| ApiError::NotFound("call not found".into()))?;
        if call.caller != username && call.callee != username {
            return Err(ApiError::Forbidden("not a participant in this call".into()));
        }
        Ok(call)
    }

    fn peer_of(call: &DmCall, username: &str) -> String {
        if call.caller == username { call.callee.clone() } else { call.caller.clone() }
    }
}

impl CallState {
    fn from_str_lossy(s: &str) -> Self {
        match s {
            "ringing" => CallState::Ringing,
            "accepted" => CallState::Accepted,
            "active" => CallState::Active,
            _ => CallState::Ended,
        }
    }
}

pub fn invite(calls: &CallRegistry, registry: &ConnectionRegistry, events: &EventBus, caller: &str, callee: &str) -> ApiResult<DmCall> {
    if !registry.user_has_connection(callee) {
        return Err(ApiError::NotFound(format!("'{callee}' is not online")));
    }
    let call = DmCall {
        call_id: uuid::Uuid::new_v4().to_string(),
        caller: caller.to_string(),
        callee: callee.to_string(),
        state: CallState::Ringing.as_str().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    calls.calls.write().unwrap().insert(call.call_id.clone(), call.clone());
    events.publish(ChatEvent::VoiceDmInvite(call.clone()));
    Ok(call)
}

pub fn accept(calls: &CallRegistry, events: &EventBus, username: &str, call_id: &str) -> ApiResult<DmCall> {
    let call = calls.participant(call_id, username)?;
    if call.callee != username {
        return Err(ApiError::Forbidden("only the callee can accept".into()));
    }
    let updated = calls.transition(call_id, CallState::Accepted)?;
    events.publish(ChatEvent::VoiceDmAccept(updated.clone()));
    Ok(updated)
}

pub fn decline(calls: &CallRegistry, events: &EventBus, username: &str, call_id: &str) -> ApiResult<()> {
    let call = calls.participant(call_id, username)?;
    calls.transition(call_id, CallState::Ended)?;
    calls.calls.write().unwrap().remove(call_id);
    events.publish(ChatEvent::VoiceDmDecline(call));
    Ok(())
}

/// Caller or callee marks the peer connection established; moves
/// Accepted -> Active.
pub fn mark_active(calls: &CallRegistry, username: &str, call_id: &str) -> ApiResult<DmCall> {
    calls.participant(call_id, username)?;
    calls.transition(call_id, CallState::Active)
}

pub fn end(calls: &CallRegistry, events: &EventBus, username: &str, call_id: &str, reason: &str) -> ApiResult<()> {
    let call = calls.participant(call_id, username)?;
    calls.transition(call_id, CallState::Ended)?;
    calls.calls.write().unwrap().remove(call_id);
    let peer = CallRegistry::peer_of(&call, username);
    events.publish(ChatEvent::VoiceDmEnd { call_id: call_id.to_string(), to: peer, reason: reason.to_string() });
    Ok(())
}

pub fn relay_sdp(calls: &CallRegistry, events: &EventBus, username: &str, call_id: &str, kind: &'static str, sdp: serde_json::Value) -> ApiResult<()> {
    let call = calls.participant(call_id, username)?;
    let peer = CallRegistry::peer_of(&call, username);
    events.publish(ChatEvent::VoiceDmSdp { call_id: call_id.to_string(), to: peer, kind, sdp });
    Ok(())
}

pub fn relay_ice(calls: &CallRegistry, events: &EventBus, username: &str, call_id: &str, candidate: serde_json::Value) -> ApiResult<()> {
    let call = calls.participant(call_id, username)?;
    let peer = CallRegistry::peer_of(&call, username);
    events.publish(ChatEvent::VoiceDmIce { call_id: call_id.to_string(), to: peer, candidate });
    Ok(())
}

/// A disconnecting connection ends any call it still holds, so the peer is
/// not left ringing or mid-call forever.
pub fn end_all_for_disconnect(calls: &CallRegistry, events: &EventBus, username: &str) {
    let affected: Vec<String> = {
        let guard = calls.calls.read().unwrap();
        guard.values().filter(|c| c.caller == username || c.callee == username).map(|c| c.call_id.clone()).collect()
    };
    for call_id in affected {
        let _ = end(calls, events, username, &call_id, "peer_disconnected");
    }
}

/// Join a room's voice roster, enforcing capacity and emitting the forced
/// leave of a uniformly-random prior member if the cap was just reduced out
/// from under the roster (see `set_voice_cap`).
pub fn room_join(registry: &ConnectionRegistry, events: &EventBus, conn_id: &str, room: &str, username: &str, cap: i64) -> ApiResult<()> {
    let roster = registry.voice_room_join(conn_id, room, cap).map_err(|limit| ApiError::CapReached { limit })?;
    events.publish(ChatEvent::VoiceRoomJoined { room: room.to_string(), user: username.to_string(), roster });
    Ok(())
}

pub fn room_leave(registry: &ConnectionRegistry, events: &EventBus, conn_id: &str, room: &str) -> ApiResult<()> {
    let user = registry.voice_room_leave(conn_id, room).ok_or_else(|| ApiError::NotFound("not in this voice room".into()))?;
    events.publish(ChatEvent::VoiceRoomLeft { room: room.to_string(), user });
    Ok(())
}

/// Signal relay between two participants already in the same voice room.
/// `kind` names the signaling message ("offer"/"answer"/"ice") the same way
/// DM calls name SDP message kinds.
pub fn room_signal(registry: &ConnectionRegistry, events: &EventBus, room: &str, from: &str, to: &str, kind: &'static str, payload: serde_json::Value) -> ApiResult<()> {
    let roster = registry.voice_roster(room);
    if !roster.contains(&to.to_string()) || !roster.contains(&from.to_string()) {
        return Err(ApiError::Forbidden("both users must be in the voice room to signal".into()));
    }
    // Initiator tiebreaker: the lexicographically smaller username offers,
    // so two peers racing to connect never both send an `offer`.
    if kind == "offer" && from >= to {
        return Err(ApiError::CallStateError("offer must be initiated by the lexicographically smaller peer".into()));
    }
    events.publish(ChatEvent::VoiceRoomSignal { room: room.to_string(), to: to.to_string(), from: from.to_string(), kind, payload });
    Ok(())
}

/// Reduce a room's voice capacity immediately, forcing out uniformly-random
/// members in excess of the new cap (spec scenario 3).
pub fn set_voice_cap(registry: &ConnectionRegistry, events: &EventBus, room: &str, new_cap: i64) {
    for user in registry.voice_room_force_reduce(room, new_cap) {
        events.publish(ChatEvent::VoiceRoomForcedLeave(crate::models::VoiceRoomForcedLeave {
            room: room.to_string(),
            user,
            reason: "cap_reduced".to_string(),
            limit: new_cap,
        }));
    }
}
