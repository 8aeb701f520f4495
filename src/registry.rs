//! Connection Registry (spec §4.2). In-memory map of live SSE connections
//! to identity and scope membership, generalized from the teacher's
//! `PresenceTracker`/`PresenceGuard` (join/leave counting + RAII cleanup).
//! Single-writer discipline: each connection's own entry is only ever
//! mutated by the request handling that connection's stream; cross-worker
//! effects always go through `EventBus`.

use crate::events::{ChatEvent, EventBus};
use crate::models::VoiceRoomRoster;
use crate::p2p::TransferRegistry;
use crate::voice::CallRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct ConnState {
    rooms: HashSet<String>,
    groups: HashSet<i64>,
    voice_rooms: HashSet<String>,
    dm_calls: HashSet<String>,
    transfers: HashSet<String>,
}

#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<String, (String, ConnState)>, // conn_id -> (username, state)
    user_conns: HashMap<String, HashSet<String>>,       // username -> conn_ids
    room_members: HashMap<String, HashSet<String>>,     // room -> usernames currently streaming
    voice_rosters: HashMap<String, Vec<String>>,        // room -> ordered usernames
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self { inner: Arc::new(RwLock::new(Inner::default())) }
    }
}

impl ConnectionRegistry {
    pub fn register(&self, conn_id: &str, username: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.connections.insert(conn_id.to_string(), (username.to_string(), ConnState::default()));
        inner.user_conns.entry(username.to_string()).or_default().insert(conn_id.to_string());
    }

    pub fn join_room(&self, conn_id: &str, room: &str) {
        let mut inner = self.inner.write().unwrap();
        if let Some((user, state)) = inner.connections.get_mut(conn_id) {
            state.rooms.insert(room.to_string());
            let user = user.clone();
            inner.room_members.entry(room.to_string()).or_default().insert(user);
        }
    }

    pub fn leave_room(&self, conn_id: &str, room: &str) {
        let mut inner = self.inner.write().unwrap();
        if let Some((_user, state)) = inner.connections.get_mut(conn_id) {
            state.rooms.remove(room);
        }
        // Recompute room_members membership lazily on disconnect/leave below.
        self.recompute_room_membership(&mut inner, room);
    }

    fn recompute_room_membership(&self, inner: &mut Inner, room: &str) {
        let mut users = HashSet::new();
        for (_id, (user, state)) in inner.connections.iter() {
            if state.rooms.contains(room) {
                users.insert(user.clone());
            }
        }
        if users.is_empty() {
            inner.room_members.remove(room);
        } else {
            inner.room_members.insert(room.to_string(), users);
        }
    }

    pub fn user_has_connection(&self, username: &str) -> bool {
        let inner = self.inner.read().unwrap();
        inner.user_conns.get(username).map(|s| !s.is_empty()).unwrap_or(false)
    }

    pub fn voice_roster(&self, room: &str) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner.voice_rosters.get(room).cloned().unwrap_or_default()
    }

    /// Usernames with a live stream currently scoped to this room (distinct
    /// from DB membership — this is "who would see `get_users_in_room`").
    pub fn room_members_live(&self, room: &str) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner.room_members.get(room).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    /// Per-room live member counts, for `get_room_counts`.
    pub fn room_counts_live(&self) -> HashMap<String, i64> {
        let inner = self.inner.read().unwrap();
        inner.room_members.iter().map(|(room, users)| (room.clone(), users.len() as i64)).collect()
    }

    pub fn voice_room_join(&self, conn_id: &str, room: &str, cap: i64) -> Result<VoiceRoomRoster, i64> {
        let mut inner = self.inner.write().unwrap();
        let roster = inner.voice_rosters.entry(room.to_string()).or_default();
        if cap > 0 && roster.len() as i64 >= cap {
            return Err(cap);
        }
        let username = inner
            .connections
            .get(conn_id)
            .map(|(u, _)| u.clone())
            .unwrap_or_default();
        if !roster.contains(&username) {
            roster.push(username);
        }
        if let Some((_u, state)) = inner.connections.get_mut(conn_id) {
            state.voice_rooms.insert(room.to_string());
        }
        let users = inner.voice_rosters.get(room).cloned().unwrap_or_default();
        Ok(VoiceRoomRoster { room: room.to_string(), users, limit: cap })
    }

    pub fn voice_room_leave(&self, conn_id: &str, room: &str) -> Option<String> {
        let mut inner = self.inner.write().unwrap();
        let username = inner.connections.get(conn_id).map(|(u, _)| u.clone())?;
        if let Some(roster) = inner.voice_rosters.get_mut(room) {
            roster.retain(|u| u != &username);
            if roster.is_empty() {
                inner.voice_rosters.remove(room);
            }
        }
        if let Some((_u, state)) = inner.connections.get_mut(conn_id) {
            state.voice_rooms.remove(room);
        }
        Some(username)
    }

    /// Remove `count` uniformly-random members from a room's voice roster
    /// (capacity-reduction forced leave). Returns the removed usernames.
    pub fn voice_room_force_reduce(&self, room: &str, new_cap: i64) -> Vec<String> {
        use rand::seq::SliceRandom;
        let mut inner = self.inner.write().unwrap();
        let Some(roster) = inner.voice_rosters.get_mut(room) else { return vec![] };
        let excess = (roster.len() as i64 - new_cap).max(0) as usize;
        if excess == 0 {
            return vec![];
        }
        let mut rng = rand::thread_rng();
        let mut indices: Vec<usize> = (0..roster.len()).collect();
        indices.shuffle(&mut rng);
        let removed_idx: HashSet<usize> = indices.into_iter().take(excess).collect();
        let mut removed = Vec::new();
        let mut kept = Vec::new();
        for (i, u) in roster.drain(..).enumerate() {
            if removed_idx.contains(&i) {
                removed.push(u);
            } else {
                kept.push(u);
            }
        }
        *roster = kept;
        removed
    }

    /// Clean up all scope membership for a dropped connection. Returns the
    /// username and the set of rooms/voice-rooms it was a member of, so the
    /// caller can publish the appropriate departure events.
    pub fn disconnect(&self, conn_id: &str) -> Option<(String, Vec<String>, Vec<String>, bool)> {
        let mut inner = self.inner.write().unwrap();
        let (username, state) = inner.connections.remove(conn_id)?;
        if let Some(set) = inner.user_conns.get_mut(&username) {
            set.remove(conn_id);
        }
        let last_connection = inner.user_conns.get(&username).map(|s| s.is_empty()).unwrap_or(true);

        let rooms: Vec<String> = state.rooms.into_iter().collect();
        for room in &rooms {
            self.recompute_room_membership(&mut inner, room);
        }
        let voice_rooms: Vec<String> = state.voice_rooms.into_iter().collect();
        for room in &voice_rooms {
            if let Some(roster) = inner.voice_rosters.get_mut(room) {
                roster.retain(|u| u != &username);
                if roster.is_empty() {
                    inner.voice_rosters.remove(room);
                }
            }
        }
        Some((username, rooms, voice_rooms, last_connection))
    }
}

/// RAII guard published alongside a registered connection's SSE stream;
/// dropping it (client disconnects) runs registry cleanup and publishes the
/// departure events the spec requires.
pub struct ConnectionGuard {
    pub registry: ConnectionRegistry,
    pub events: Arc<EventBus>,
    pub conn_id: String,
    pub calls: CallRegistry,
    pub transfers: TransferRegistry,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some((username, rooms, voice_rooms, last_connection)) = self.registry.disconnect(&self.conn_id) {
            for room in voice_rooms {
                self.events.publish(ChatEvent::VoiceRoomLeft { room, user: username.clone() });
            }
            // Only the connection's own stream drop, never a peer's, should
            // tear down that user's calls/transfers — harmless if the user
            // still has another live stream, since these are keyed by
            // participant username rather than connection id.
            crate::voice::end_all_for_disconnect(&self.calls, &self.events, &username);
            crate::p2p::cancel_all_for_disconnect(&self.transfers, &self.events, &username);
            if last_connection {
                self.events.publish(ChatEvent::FriendPresenceUpdate {
                    friend: username.clone(),
                    observer: String::new(),
                    state: "offline".to_string(),
                });
            }
            let _ = rooms; // room membership already recomputed; no per-room event required on plain disconnect
        }
    }
}
