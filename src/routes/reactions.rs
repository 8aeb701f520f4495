//! Reaction routes (spec §4.4's finality requirement: one reaction per
//! (message, user), insert-once and non-revocable).

use crate::db::Db;
use crate::error::ApiResult;
use crate::events::EventBus;
use crate::models::{MessageReactions, ReactRequest};
use crate::relay;
use rocket::serde::json::Json;
use rocket::{post, State};

use super::AuthUser;

#[post("/api/v1/reactions", format = "json", data = "<body>")]
pub fn react_to_message(
    db: &State<Db>,
    events: &State<EventBus>,
    user: AuthUser,
    body: Json<ReactRequest>,
) -> ApiResult<Json<MessageReactions>> {
    relay::react_to_message(db, events, &user.0.username, &body).map(Json)
}
