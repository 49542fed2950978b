//! Group and membership endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{AddMemberRequest, Group, GroupMemberWithUser, GroupNameRequest};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::validation::{require_uuid, ApiJson};

/// Load a group the caller belongs to.
///
/// A missing group is 404; an existing group the caller is not in is 403.
pub(super) async fn require_member(
    state: &AppState,
    group_id: &str,
    user: &AuthUser,
) -> Result<Group, ApiError> {
    require_uuid(group_id, "group_id")?;

    let group = state.groups.get_group(group_id).await?;
    if !state.groups.is_member(group_id, &user.id).await? {
        return Err(ApiError::forbidden("You are not a member of this group"));
    }

    Ok(group)
}

/// List groups for the current user
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Group>>, ApiError> {
    let groups = state.groups.get_groups(&user.id).await?;
    Ok(Json(groups))
}

/// Create a new group with the caller as its first member
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<GroupNameRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = state.groups.create_group(&req.name, &user.id).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: AuthUser,
) -> Result<Json<Group>, ApiError> {
    let group = require_member(&state, &id, &user).await?;
    Ok(Json(group))
}

/// Rename a group
pub async fn update_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: AuthUser,
    ApiJson(req): ApiJson<GroupNameRequest>,
) -> Result<Json<Group>, ApiError> {
    require_member(&state, &id, &user).await?;
    let group = state.groups.update_group(&id, &req.name).await?;
    Ok(Json(group))
}

/// Delete a group (creator only)
pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: AuthUser,
) -> Result<StatusCode, ApiError> {
    let group = require_member(&state, &id, &user).await?;
    if group.created_by != user.id {
        return Err(ApiError::forbidden(
            "Only the group's creator can delete it",
        ));
    }

    state.groups.delete_group(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: AuthUser,
) -> Result<Json<Vec<GroupMemberWithUser>>, ApiError> {
    require_member(&state, &id, &user).await?;
    let members = state.groups.list_members(&id).await?;
    Ok(Json(members))
}

pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: AuthUser,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> Result<StatusCode, ApiError> {
    require_member(&state, &id, &user).await?;
    require_uuid(&req.user_id, "user_id")?;

    state.groups.add_member(&id, &req.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<StatusCode, ApiError> {
    require_member(&state, &id, &user).await?;
    require_uuid(&user_id, "user_id")?;

    state.groups.remove_member(&id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
