//! Group and membership models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named collection of users sharing expenses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
}

/// Membership row linking a user to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GroupMember {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub joined_at: String,
}

/// Group member with user details
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupMemberWithUser {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub joined_at: String,
    /// User's name
    pub user_name: String,
    /// User's email
    pub user_email: String,
}

/// Request to create or rename a group
#[derive(Debug, Deserialize)]
pub struct GroupNameRequest {
    pub name: String,
}

/// Request to add a member to a group
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
}
