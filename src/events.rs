//! Pub/Sub Bridge. A single broadcast channel stands in for the
//! cross-worker bridge the spec requires; a single-process deployment
//! satisfies the contract directly (per-channel FIFO is free — it's one
//! channel — and `tokio::sync::broadcast` gives at-least-once delivery to
//! live subscribers). Scoped filtering happens at the subscriber, exactly
//! as the teacher's `routes/stream.rs` filters a shared event stream by
//! `room_id` per connection.

use crate::models::{
    ChatMessage, DmCall, GroupInvite, MessageReactions, P2PTransferStatus, Room,
    RoomForcedLeave, RoomInvite, RoomPolicyState, VoiceRoomForcedLeave, VoiceRoomRoster,
};
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum ChatEvent {
    ChatMessage(ChatMessage),
    PrivateMessage { to: String, sender: String, cipher: String },
    MissedPmSummaryChanged { to: String },
    Reactions(MessageReactions),
    RoomCreated(Room),
    RoomPolicyChanged(RoomPolicyState),
    RoomForcedLeave(RoomForcedLeave),
    RoomInviteReceived(RoomInvite),
    GroupInviteReceived(GroupInvite),
    FriendPresenceUpdate { friend: String, observer: String, state: String },
    FriendRequestReceived { to: String, from: String },
    FriendRequestAccepted { to: String, by: String },
    ForceLogout { username: String, reason: String },
    GlobalAnnouncement { message: String },

    VoiceDmInvite(DmCall),
    VoiceDmAccept(DmCall),
    VoiceDmDecline(DmCall),
    VoiceDmSdp { call_id: String, to: String, kind: &'static str, sdp: serde_json::Value },
    VoiceDmIce { call_id: String, to: String, candidate: serde_json::Value },
    VoiceDmEnd { call_id: String, to: String, reason: String },

    VoiceRoomJoined { room: String, user: String, roster: VoiceRoomRoster },
    VoiceRoomLeft { room: String, user: String },
    VoiceRoomSignal { room: String, to: String, from: String, kind: &'static str, payload: serde_json::Value },
    VoiceRoomForcedLeave(VoiceRoomForcedLeave),

    P2POffer { to: String, from: String, transfer_id: String, meta: serde_json::Value },
    P2PAnswer { to: String, transfer_id: String, sdp: serde_json::Value },
    P2PDecline { to: String, transfer_id: String },
    P2PIce { to: String, transfer_id: String, candidate: serde_json::Value },
    P2PStatus(P2PTransferStatus),
}

#[derive(Clone)]
pub struct EventBus {
    pub sender: broadcast::Sender<ChatEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(2048);
        EventBus { sender }
    }

    pub fn publish(&self, event: ChatEvent) {
        let _ = self.sender.send(event);
    }
}
