use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMembership {
    pub group_id: i64,
    pub user: String,
    pub role: String,
    pub joined_at: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupInviteRequest {
    pub group_id: i64,
    pub invitee: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupInvite {
    pub id: String,
    pub group_id: i64,
    pub invitee: String,
    pub inviter: String,
    pub created_at: String,
}
