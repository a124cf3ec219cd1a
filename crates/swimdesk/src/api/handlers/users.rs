//! Admin user management.
//!
//! Every route requires the admin role. An admin with an organization only
//! sees and edits users of that organization; an admin without one is global.
//! Users outside the caller's scope are reported as not found.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::{CurrentUser, RequireAdmin};
use crate::user::{CreateUserRequest, UpdateUserRequest, User, UserInfo, UserListQuery};

/// Load a user the caller is allowed to administer.
async fn load_scoped(state: &AppState, admin: &CurrentUser, user_id: &str) -> ApiResult<User> {
    state
        .users
        .get_user(user_id)
        .await?
        .filter(|u| admin.can_manage_organization(u.organization_id.as_deref()))
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", user_id)))
}

/// List users (admin only).
#[instrument(skip(state, admin))]
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(mut query): Query<UserListQuery>,
) -> ApiResult<Json<Vec<UserInfo>>> {
    if let Some(own) = admin.organization_id() {
        match query.organization_id.as_deref() {
            Some(requested) if requested != own => {
                return Err(ApiError::forbidden(
                    "Cannot list users of another organization",
                ));
            }
            _ => query.organization_id = Some(own.to_string()),
        }
    }

    let users = state.users.list_users(query).await?;
    let infos: Vec<UserInfo> = users.into_iter().map(UserInfo::from).collect();
    info!(count = infos.len(), "Listed users");
    Ok(Json(infos))
}

/// Get a user by id (admin only).
#[instrument(skip(state, admin))]
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserInfo>> {
    let user = load_scoped(&state, &admin, &user_id).await?;
    Ok(Json(user.into()))
}

/// Create a user (admin only).
///
/// A scoped admin's new users default to the admin's organization.
#[instrument(skip(state, admin, request), fields(email = %request.email))]
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(mut request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserInfo>)> {
    if request.organization_id.is_none() {
        request.organization_id = admin.organization_id().map(str::to_string);
    }
    if !admin.can_manage_organization(request.organization_id.as_deref()) {
        return Err(ApiError::forbidden(
            "Cannot create users outside your organization",
        ));
    }

    let user = state.users.create_user(request).await?;
    info!(user_id = %user.id, admin_id = %admin.id(), "Admin created user");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Update a user (admin only).
#[instrument(skip(state, admin, request))]
pub async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserInfo>> {
    load_scoped(&state, &admin, &user_id).await?;

    if let Some(target) = &request.organization_id {
        if !admin.can_manage_organization(target.as_deref()) {
            return Err(ApiError::forbidden(
                "Cannot move users outside your organization",
            ));
        }
    }

    let user = state.users.update_user(&user_id, request).await?;
    Ok(Json(user.into()))
}

/// Delete a user (admin only).
#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    if user_id == admin.id() {
        return Err(ApiError::bad_request("Admins cannot delete their own account"));
    }
    load_scoped(&state, &admin, &user_id).await?;

    state.users.delete_user(&user_id).await?;
    info!(user_id = %user_id, admin_id = %admin.id(), "Admin deleted user");
    Ok(StatusCode::NO_CONTENT)
}
