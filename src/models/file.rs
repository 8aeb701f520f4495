use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata for an encrypted file blob. Payload bytes are opaque; the
/// server stores ciphertext and a per-recipient wrapped-key map only.
#[derive(Debug, Clone, Serialize)]
pub struct EncryptedFileMeta {
    pub id: String,
    pub owner: String,
    pub scope: String, // "dm" | "group"
    pub iv: String,
    pub sha256: String,
    pub size: i64,
    pub mime_hint: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadEncryptedFileRequest {
    pub scope: String,
    pub iv: String,
    /// base64-encoded ciphertext.
    pub ciphertext: String,
    pub sha256: String,
    pub mime_hint: String,
    /// username -> base64-encoded wrapped symmetric key.
    pub wrapped_keys: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct UploadEncryptedFileResponse {
    pub id: String,
}
