use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Friendship {
    pub user_a: String,
    pub user_b: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub public_key: String,
    pub is_admin: bool,
}
