//! P2P encrypted file transfer signaling (spec §4.8). Same shape as
//! `voice.rs`'s DM call state machine: the server relays offer/answer/ICE
//! and tracks transfer state in memory, with a background sweep expiring
//! transfers that never leave their handshake or active window.

use crate::error::{ApiError, ApiResult};
use crate::events::{ChatEvent, EventBus};
use crate::models::{P2PTransferStatus, TransferState};
use crate::registry::ConnectionRegistry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

struct Transfer {
    sender: String,
    receiver: String,
    state: TransferState,
    started_at: chrono::DateTime<chrono::Utc>,
}

/// Cheap to clone: the map lives behind an `Arc`, the same way
/// `ConnectionRegistry` shares its inner state across clones so the
/// expiry sweep task and the request handlers operate on one roster.
#[derive(Default, Clone)]
pub struct TransferRegistry {
    transfers: Arc<RwLock<HashMap<String, Transfer>>>,
}

impl TransferRegistry {
    fn valid_transition(from: TransferState, to: TransferState) -> bool {
        matches!(
            (from, to),
            (TransferState::Offered, TransferState::Answered)
                | (TransferState::Offered, TransferState::Declined)
                | (TransferState::Offered, TransferState::Failed)
                | (TransferState::Answered, TransferState::Active)
                | (TransferState::Answered, TransferState::Failed)
                | (TransferState::Active, TransferState::Done)
                | (TransferState::Active, TransferState::Failed)
        )
    }

    fn status(id: &str, t: &Transfer) -> P2PTransferStatus {
        P2PTransferStatus {
            transfer_id: id.to_string(),
            sender: t.sender.clone(),
            receiver: t.receiver.clone(),
            state: t.state.as_str().to_string(),
        }
    }
}

pub fn offer(
    transfers: &TransferRegistry,
    registry: &ConnectionRegistry,
    events: &EventBus,
    transfer_id: &str,
    sender: &str,
    receiver: &str,
    meta: serde_json::Value,
) -> ApiResult<()> {
    if !registry.user_has_connection(receiver) {
        return Err(ApiError::NotFound(format!("'{receiver}' is not online")));
    }
    let mut guard = transfers.transfers.write().unwrap();
    if guard.contains_key(transfer_id) {
        return Err(ApiError::Conflict("transfer id already in use".into()));
    }
    guard.insert(
        transfer_id.to_string(),
        Transfer { sender: sender.to_string(), receiver: receiver.to_string(), state: TransferState::Offered, started_at: chrono::Utc::now() },
    );
    drop(guard);
    events.publish(ChatEvent::P2POffer { to: receiver.to_string(), from: sender.to_string(), transfer_id: transfer_id.to_string(), meta });
    Ok(())
}

fn transition(transfers: &TransferRegistry, transfer_id: &str, username: &str, to: TransferState) -> ApiResult<P2PTransferStatus> {
    let mut guard = transfers.transfers.write().unwrap();
    let t = guard.get_mut(transfer_id).ok_or_else(|| ApiError::NotFound("transfer not found".into()))?;
    if t.sender != username && t.receiver != username {
        return Err(ApiError::Forbidden("not a participant in this transfer".into()));
    }
    if !TransferRegistry::valid_transition(t.state, to) {
        return Err(ApiError::CallStateError(format!("cannot move transfer from {} to {}", t.state.as_str(), to.as_str())));
    }
    t.state = to;
    Ok(TransferRegistry::status(transfer_id, t))
}

pub fn answer(transfers: &TransferRegistry, events: &EventBus, username: &str, transfer_id: &str, sdp: serde_json::Value) -> ApiResult<()> {
    let status = transition(transfers, transfer_id, username, TransferState::Answered)?;
    events.publish(ChatEvent::P2PAnswer { to: status.sender.clone(), transfer_id: transfer_id.to_string(), sdp });
    events.publish(ChatEvent::P2PStatus(status));
    Ok(())
}

pub fn decline(transfers: &TransferRegistry, events: &EventBus, username: &str, transfer_id: &str) -> ApiResult<()> {
    let status = transition(transfers, transfer_id, username, TransferState::Declined)?;
    transfers.transfers.write().unwrap().remove(transfer_id);
    events.publish(ChatEvent::P2PDecline { to: status.sender.clone(), transfer_id: transfer_id.to_string() });
    events.publish(ChatEvent::P2PStatus(status));
    Ok(())
}

pub fn mark_active(transfers: &TransferRegistry, events: &EventBus, username: &str, transfer_id: &str) -> ApiResult<()> {
    let status = transition(transfers, transfer_id, username, TransferState::Active)?;
    events.publish(ChatEvent::P2PStatus(status));
    Ok(())
}

pub fn mark_done(transfers: &TransferRegistry, events: &EventBus, username: &str, transfer_id: &str) -> ApiResult<()> {
    let status = transition(transfers, transfer_id, username, TransferState::Done)?;
    transfers.transfers.write().unwrap().remove(transfer_id);
    events.publish(ChatEvent::P2PStatus(status));
    Ok(())
}

pub fn mark_failed(transfers: &TransferRegistry, events: &EventBus, username: &str, transfer_id: &str) -> ApiResult<()> {
    let status = transition(transfers, transfer_id, username, TransferState::Failed)?;
    transfers.transfers.write().unwrap().remove(transfer_id);
    events.publish(ChatEvent::P2PStatus(status));
    Ok(())
}

pub fn relay_ice(transfers: &TransferRegistry, events: &EventBus, username: &str, transfer_id: &str, candidate: serde_json::Value) -> ApiResult<()> {
    let guard = transfers.transfers.read().unwrap();
    let t = guard.get(transfer_id).ok_or_else(|| ApiError::NotFound("transfer not found".into()))?;
    if t.sender != username && t.receiver != username {
        return Err(ApiError::Forbidden("not a participant in this transfer".into()));
    }
    let to = if t.sender == username { t.receiver.clone() } else { t.sender.clone() };
    drop(guard);
    events.publish(ChatEvent::P2PIce { to, transfer_id: transfer_id.to_string(), candidate });
    Ok(())
}

/// A disconnecting connection fails any transfer it still holds a pending
/// handshake or active leg in, so the other side isn't left waiting forever.
/// Mirrors `voice::end_all_for_disconnect`.
pub fn cancel_all_for_disconnect(transfers: &TransferRegistry, events: &EventBus, username: &str) {
    let affected: Vec<String> = {
        let guard = transfers.transfers.read().unwrap();
        guard
            .iter()
            .filter(|(_, t)| (t.sender == username || t.receiver == username) && !t.state.is_terminal())
            .map(|(id, _)| id.clone())
            .collect()
    };
    for transfer_id in affected {
        let _ = mark_failed(transfers, events, username, &transfer_id);
    }
}

/// Expire transfers stuck before `Active` past the handshake window, and
/// transfers stuck in `Active` past the overall transfer window. Mirrors
/// the teacher's `retention::spawn_retention_task` sweep shape.
pub fn sweep_expired(transfers: &TransferRegistry, events: &EventBus, handshake_timeout_secs: i64, transfer_timeout_secs: i64) -> usize {
    let now = chrono::Utc::now();
    let mut expired = Vec::new();
    {
        let guard = transfers.transfers.read().unwrap();
        for (id, t) in guard.iter() {
            let age = now.signed_duration_since(t.started_at).num_seconds();
            let timeout = if matches!(t.state, TransferState::Active) { transfer_timeout_secs } else { handshake_timeout_secs };
            if age > timeout && !t.state.is_terminal() {
                expired.push(id.clone());
            }
        }
    }
    let mut guard = transfers.transfers.write().unwrap();
    for id in &expired {
        if let Some(t) = guard.remove(id) {
            events.publish(ChatEvent::P2PStatus(P2PTransferStatus {
                transfer_id: id.clone(),
                sender: t.sender,
                receiver: t.receiver,
                state: TransferState::Failed.as_str().to_string(),
            }));
        }
    }
    expired.len()
}

pub fn spawn_expiry_sweep(transfers: TransferRegistry, events: Arc<EventBus>, handshake_timeout_secs: i64, transfer_timeout_secs: i64) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            let n = sweep_expired(&transfers, &events, handshake_timeout_secs, transfer_timeout_secs);
            if n > 0 {
                println!("🧹 p2p sweep: expired {n} transfer(s)");
            }
        }
    });
}
