use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub username: String,
    pub email_hint: Option<String>,
    pub is_admin: bool,
    pub public_key: String,
    pub last_login_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub username_ci: String,
    pub email: String,
    pub email_ci: String,
    pub password_hash: String,
    pub recovery_pin_hash: Option<String>,
    pub public_key: String,
    pub encrypted_private_key: String,
    pub is_admin: bool,
    pub roles: Vec<String>,
    pub lockout_count: u32,
    pub locked_until: Option<i64>,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub recovery_pin: Option<String>,
    pub public_key: String,
    pub encrypted_private_key: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub username: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Validated claims attached to an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthClaims {
    pub username: String,
    pub session_id: String,
    pub jti: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub sid: String,
    pub jti: String,
    pub kind: String,
    pub iat: i64,
    pub exp: i64,
}
