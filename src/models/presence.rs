use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceState {
    Online,
    Away,
    Busy,
    Invisible,
}

impl PresenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::Online => "online",
            PresenceState::Away => "away",
            PresenceState::Busy => "busy",
            PresenceState::Invisible => "invisible",
        }
    }
    pub fn from_str(s: &str) -> Self {
        match s {
            "away" => PresenceState::Away,
            "busy" => PresenceState::Busy,
            "invisible" => PresenceState::Invisible,
            _ => PresenceState::Online,
        }
    }
    /// The state a friend observes: invisible is shown as offline.
    pub fn observed_by_friend(&self, has_connection: bool) -> &'static str {
        if !has_connection {
            return "offline";
        }
        match self {
            PresenceState::Invisible => "offline",
            other => other.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PresenceSnapshot {
    pub user: String,
    pub presence: String,
    pub custom_status: Option<String>,
    pub last_seen: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPresenceRequest {
    #[serde(default = "super::default_true")]
    pub online: bool,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub custom_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FriendRequestAction {
    pub from_user: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FriendRequest {
    pub from_user: String,
    pub to_user: String,
    pub created_at: String,
}
