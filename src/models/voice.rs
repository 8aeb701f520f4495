use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    Ringing,
    Accepted,
    Active,
    Ended,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Ringing => "ringing",
            CallState::Accepted => "accepted",
            CallState::Active => "active",
            CallState::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DmCall {
    pub call_id: String,
    pub caller: String,
    pub callee: String,
    pub state: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct VoiceDmInvite {
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct VoiceDmAction {
    pub call_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VoiceDmSdp {
    pub call_id: String,
    pub sdp: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct VoiceDmIce {
    pub call_id: String,
    pub candidate: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceRoomRoster {
    pub room: String,
    pub users: Vec<String>,
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct VoiceRoomJoinRequest {
    pub room: String,
}

#[derive(Debug, Deserialize)]
pub struct VoiceRoomSignal {
    pub room: String,
    pub to: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceRoomForcedLeave {
    pub room: String,
    pub user: String,
    pub reason: String,
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetVoiceCapRequest {
    pub cap: i64,
}
