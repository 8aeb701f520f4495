//! Presence routes (spec §6 `set_my_presence`/`get_my_presence`/
//! `get_friend_presence`).

use crate::db::Db;
use crate::error::{ApiError, ApiResult};
use crate::events::EventBus;
use crate::models::{PresenceSnapshot, SetPresenceRequest};
use crate::presence;
use crate::registry::ConnectionRegistry;
use rocket::serde::json::Json;
use rocket::{get, post, State};

use super::AuthUser;

#[post("/api/v1/presence", format = "json", data = "<body>")]
pub fn set_my_presence(
    db: &State<Db>,
    events: &State<EventBus>,
    registry: &State<ConnectionRegistry>,
    user: AuthUser,
    body: Json<SetPresenceRequest>,
) -> ApiResult<Json<PresenceSnapshot>> {
    presence::set_my_presence(db, events, registry, &user.0.username, &body).map(Json)
}

#[get("/api/v1/presence/me")]
pub fn get_my_presence(db: &State<Db>, user: AuthUser) -> ApiResult<Json<Option<PresenceSnapshot>>> {
    presence::get_my_presence(db, &user.0.username).map(Json)
}

#[get("/api/v1/presence/<friend>")]
pub fn get_friend_presence(
    db: &State<Db>,
    registry: &State<ConnectionRegistry>,
    user: AuthUser,
    friend: &str,
) -> ApiResult<Json<PresenceSnapshot>> {
    presence::get_friend_presence(db, registry, &user.0.username, friend)?
        .map(Json)
        .ok_or_else(|| ApiError::Forbidden("not friends with this user".into()))
}
