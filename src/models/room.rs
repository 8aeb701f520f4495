use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub visibility: String, // public|private
    pub is_18plus: bool,
    pub is_nsfw: bool,
    pub created_by: String,
    pub parent_room: Option<String>, // Some(parent name) for autoscaled sub-rooms
    pub capacity: Option<i64>,
    pub locked: bool,
    pub readonly: bool,
    pub slowmode_seconds: i64,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default)]
    pub is_18plus: bool,
    #[serde(default)]
    pub is_nsfw: bool,
    #[serde(default)]
    pub capacity: Option<i64>,
}

fn default_category() -> String {
    "general".to_string()
}
fn default_visibility() -> String {
    "public".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RoomPolicyUpdate {
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(default)]
    pub readonly: Option<bool>,
    #[serde(default)]
    pub slowmode_seconds: Option<i64>,
    pub set_by: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomPolicyState {
    pub room: String,
    pub locked: bool,
    pub readonly: bool,
    pub slowmode_seconds: i64,
    pub can_send: bool,
    pub block_reason: Option<String>,
    pub set_by: String,
    pub ts: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomRole {
    Owner,
    Moderator,
    Member,
}

impl RoomRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomRole::Owner => "owner",
            RoomRole::Moderator => "moderator",
            RoomRole::Member => "member",
        }
    }
    pub fn from_str(s: &str) -> Self {
        match s {
            "owner" => RoomRole::Owner,
            "moderator" => RoomRole::Moderator,
            _ => RoomRole::Member,
        }
    }
    pub fn can_override_policy(&self) -> bool {
        matches!(self, RoomRole::Owner | RoomRole::Moderator)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomMembership {
    pub room: String,
    pub user: String,
    pub role: String,
    pub joined_at: String,
}

#[derive(Debug, Deserialize)]
pub struct RoomInviteRequest {
    pub room: String,
    pub invitee: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomInvite {
    pub id: String,
    pub room: String,
    pub invitee: String,
    pub inviter: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinRoomResponse {
    pub room: String,
    pub history: Vec<super::ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomForcedLeave {
    pub room: String,
    pub user: String,
    pub reason: String,
}
