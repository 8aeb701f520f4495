//! Friend-scoped presence fan-out (spec §4.2's presence surface). Distinct
//! from `db::presence` (storage) and `models::presence` (wire shapes): this
//! module is the push logic deciding who gets told when a user's state
//! changes. `invisible` is always observed by friends as `offline`.

use crate::db::{self, Db};
use crate::error::ApiResult;
use crate::events::{ChatEvent, EventBus};
use crate::models::{PresenceSnapshot, PresenceState, SetPresenceRequest};
use crate::registry::ConnectionRegistry;

pub fn set_my_presence(db: &Db, events: &EventBus, registry: &ConnectionRegistry, username: &str, req: &SetPresenceRequest) -> ApiResult<PresenceSnapshot> {
    let conn = db.conn();
    let state = if !req.online {
        PresenceState::Invisible
    } else {
        req.state.as_deref().map(PresenceState::from_str).unwrap_or(PresenceState::Online)
    };
    db::upsert_presence(&conn, username, state.as_str(), req.custom_status.as_deref())?;
    let snapshot = db::get_presence(&conn, username)?.expect("just upserted");
    drop(conn);

    let has_connection = registry.user_has_connection(username);
    let observed = state.observed_by_friend(has_connection);
    for friend in db::list_friends(&db.conn(), username)? {
        events.publish(ChatEvent::FriendPresenceUpdate { friend: username.to_string(), observer: friend, state: observed.to_string() });
    }
    Ok(snapshot)
}

pub fn get_my_presence(db: &Db, username: &str) -> ApiResult<Option<PresenceSnapshot>> {
    db::get_presence(&db.conn(), username)
}

/// A friend's presence as observed by `observer`; `None` if they aren't
/// friends, since presence is only shared within the friend graph.
pub fn get_friend_presence(db: &Db, registry: &ConnectionRegistry, observer: &str, friend: &str) -> ApiResult<Option<PresenceSnapshot>> {
    let conn = db.conn();
    if !db::are_friends(&conn, observer, friend)? {
        return Ok(None);
    }
    let Some(mut snapshot) = db::get_presence(&conn, friend)? else { return Ok(None) };
    let has_connection = registry.user_has_connection(friend);
    snapshot.presence = PresenceState::from_str(&snapshot.presence).observed_by_friend(has_connection).to_string();
    Ok(Some(snapshot))
}
