//! Liveness/metrics routes and shared error catchers (spec §6 `GET /health`;
//! see `SPEC_FULL.md` §10 for why `/health` is carried even though the spec
//! itself only names it in passing).

use crate::db::Db;
use crate::error::ApiError;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, State};

#[get("/api/v1/health")]
pub fn health(db: &State<Db>) -> (Status, Json<serde_json::Value>) {
    if db.is_healthy() {
        (Status::Ok, Json(serde_json::json!({"status": "ok", "service": "echochat"})))
    } else {
        (Status::ServiceUnavailable, Json(serde_json::json!({"status": "unavailable", "service": "echochat"})))
    }
}

#[rocket::catch(429)]
pub fn too_many_requests() -> Json<serde_json::Value> {
    Json(serde_json::json!({"kind": "RateLimited", "message": "too many requests"}))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"kind": "NotFound", "message": "not found"}))
}

#[rocket::catch(401)]
pub fn unauthorized() -> Json<ApiError> {
    Json(ApiError::Unauthorized("authentication required".into()))
}
