//! Authentication handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::{AuthError, Claims, CurrentUser};
use crate::user::UserRole;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Session payload as seen by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub organization_id: Option<String>,
    /// Expiry as a Unix timestamp.
    pub expires_at: i64,
}

impl From<&Claims> for SessionResponse {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: claims.email.clone(),
            role: claims.role,
            organization_id: claims.organization_id.clone(),
            expires_at: claims.exp,
        }
    }
}

/// Login and refresh response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionResponse,
}

/// Change-password request body.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Log in with email and password.
///
/// Unknown email, wrong password, inactive account and an unusable stored
/// hash all produce the same 401.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .users
        .verify_credentials(&request.email, &request.password)
        .await?
        .ok_or_else(|| {
            warn!("login rejected");
            AuthError::InvalidCredentials
        })?;

    let (token, claims) = state.auth.issue_token(&user)?;
    let cookie = state.auth.session_cookie(&token);
    info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(LoginResponse {
            token,
            user: SessionResponse::from(&claims),
        }),
    ))
}

/// Clear the session cookie.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, state.auth.clear_cookie())]),
        StatusCode::NO_CONTENT,
    )
}

/// Current session payload.
pub async fn me(user: CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse::from(&user.claims))
}

/// Issue a fresh token derived from the current user record.
///
/// Role and organization changes made since login take effect here.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn refresh(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let db_user = state
        .users
        .get_user(user.id())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("Session is no longer valid"))?;

    let (token, claims) = state.auth.issue_token(&db_user)?;
    let cookie = state.auth.session_cookie(&token);

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(LoginResponse {
            token,
            user: SessionResponse::from(&claims),
        }),
    ))
}

/// Change the caller's own password.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let changed = state
        .users
        .change_password(user.id(), &request.current_password, &request.new_password)
        .await?;

    if !changed {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    Ok(StatusCode::NO_CONTENT)
}
