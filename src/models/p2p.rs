use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    Offered,
    Answered,
    Active,
    Done,
    Declined,
    Failed,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Offered => "offered",
            TransferState::Answered => "answered",
            TransferState::Active => "active",
            TransferState::Done => "done",
            TransferState::Declined => "declined",
            TransferState::Failed => "failed",
        }
    }
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Done | TransferState::Declined | TransferState::Failed
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct P2PFileOffer {
    pub transfer_id: String,
    pub to: String,
    pub meta: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct P2PFileAnswer {
    pub transfer_id: String,
    pub sdp: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct P2PFileDecline {
    pub transfer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct P2PFileIce {
    pub transfer_id: String,
    pub candidate: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct P2PTransferStatus {
    pub transfer_id: String,
    pub sender: String,
    pub receiver: String,
    pub state: String,
}
