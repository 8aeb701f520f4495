//! Central error type. Every route returns `Result<T, ApiError>` so failures
//! share one JSON shape and one set of status codes, instead of the
//! ad hoc `(Status, Json<Value>)` tuples a smaller service gets away with.

use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;

/// Error kinds named in the spec's error handling design. The string form
/// (`kind()`) is what clients match on; the `Display` message is a short
/// human string that must never leak whether a username/email exists.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum ApiError {
    BadInput(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    RateLimited { message: String, retry_after_secs: u64 },
    LoginLocked { retry_after_secs: i64 },
    ReadOnly,
    Locked,
    SlowMode { retry_after_secs: i64 },
    NotInRoom,
    CapReached { limit: i64 },
    ReactionFinal,
    CallStateError(String),
    PeerGone,
    SlowConsumer,
    StorageUnavailable,
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::BadInput(_) => Status::BadRequest,
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::RateLimited { .. } => Status::TooManyRequests,
            ApiError::LoginLocked { .. } => Status::Forbidden,
            ApiError::ReadOnly | ApiError::Locked | ApiError::SlowMode { .. } => Status::Forbidden,
            ApiError::NotInRoom => Status::Forbidden,
            ApiError::CapReached { .. } => Status::Conflict,
            ApiError::ReactionFinal => Status::Conflict,
            ApiError::CallStateError(_) => Status::Conflict,
            ApiError::PeerGone => Status::Gone,
            ApiError::SlowConsumer => Status::Conflict,
            ApiError::StorageUnavailable => Status::ServiceUnavailable,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadInput(_) => "BadInput",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Conflict(_) => "Conflict",
            ApiError::RateLimited { .. } => "RateLimited",
            ApiError::LoginLocked { .. } => "LoginLocked",
            ApiError::ReadOnly => "ReadOnly",
            ApiError::Locked => "Locked",
            ApiError::SlowMode { .. } => "SlowMode",
            ApiError::NotInRoom => "NotInRoom",
            ApiError::CapReached { .. } => "CapReached",
            ApiError::ReactionFinal => "ReactionFinal",
            ApiError::CallStateError(_) => "CallStateError",
            ApiError::PeerGone => "PeerGone",
            ApiError::SlowConsumer => "SlowConsumer",
            ApiError::StorageUnavailable => "StorageUnavailable",
            ApiError::Internal(_) => "Internal",
        }
    }

    /// Generic message safe to return to the caller. Credential failures
    /// and "user does not exist" must be indistinguishable from outside.
    pub fn message(&self) -> String {
        match self {
            ApiError::BadInput(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::CallStateError(m)
            | ApiError::Internal(m) => m.clone(),
            ApiError::RateLimited { message, .. } => message.clone(),
            ApiError::LoginLocked { .. } => "account temporarily locked".to_string(),
            ApiError::ReadOnly => "room is read-only".to_string(),
            ApiError::Locked => "room is locked".to_string(),
            ApiError::SlowMode { .. } => "slowmode is active".to_string(),
            ApiError::NotInRoom => "not a member of this room".to_string(),
            ApiError::CapReached { limit } => format!("voice room is full (limit {limit})"),
            ApiError::ReactionFinal => "reaction already recorded for this message".to_string(),
            ApiError::PeerGone => "peer disconnected".to_string(),
            ApiError::SlowConsumer => "connection is too slow, disconnecting".to_string(),
            ApiError::StorageUnavailable => "storage is temporarily unavailable".to_string(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        eprintln!("⚠️  storage error: {e}");
        ApiError::StorageUnavailable
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let mut body = serde_json::json!({
            "error": self.message(),
            "kind": self.kind(),
        });
        match &self {
            ApiError::RateLimited { retry_after_secs, .. } => {
                body["retry_after_secs"] = serde_json::json!(retry_after_secs);
            }
            ApiError::LoginLocked { retry_after_secs } => {
                body["retry_after_secs"] = serde_json::json!(retry_after_secs);
            }
            ApiError::SlowMode { retry_after_secs } => {
                body["retry_after_secs"] = serde_json::json!(retry_after_secs);
            }
            ApiError::CapReached { limit } => {
                body["limit"] = serde_json::json!(limit);
            }
            _ => {}
        }
        Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
