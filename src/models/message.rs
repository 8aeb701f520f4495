use serde::{Deserialize, Serialize};

/// A room or group message. Exactly one of `message`/`cipher` round-trips
/// through the wire depending on whether the room carries plaintext or
/// end-to-end envelopes; the server never inspects either.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub scope: String, // "room" | "group"
    pub scope_id: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    pub timestamp: String,
    pub seq: i64,
}

/// Placeholder text transmitted in the `message` field when `cipher` carries
/// the actual payload, so legacy consumers that only read `message` degrade
/// gracefully instead of seeing an empty string.
pub const CIPHERTEXT_PLACEHOLDER: &str = "[encrypted message]";

#[derive(Debug, Deserialize)]
pub struct SendRoomMessage {
    pub room: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub cipher: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendGroupMessage {
    pub group_id: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub cipher: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub before_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub messages: Vec<ChatMessage>,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendDirectMessage {
    pub to: String,
    pub cipher: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfflineMessageOut {
    pub id: String,
    pub cipher: String,
    pub ts: String,
}

#[derive(Debug, Deserialize)]
pub struct FetchOfflineQuery {
    pub from_user: String,
    #[serde(default)]
    pub peek: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissedPmSummaryEntry {
    pub sender: String,
    pub count: i64,
}

/// Allowed reaction emoji set. Kept small and enumerable per the spec.
pub const ALLOWED_REACTIONS: &[&str] = &["👍", "❤️", "😂", "😮", "😢", "🙏"];

#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    pub room: String,
    pub message_id: String,
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageReactions {
    pub room: String,
    pub message_id: String,
    pub counts: std::collections::BTreeMap<String, i64>,
}
