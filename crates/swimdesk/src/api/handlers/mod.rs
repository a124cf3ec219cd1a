//! API request handlers.
//!
//! - `auth`: login, logout, session introspection, refresh and password change
//! - `users`: admin user management, scoped by organization
//! - `misc`: health check

mod auth;
mod misc;
mod users;

pub use auth::{
    ChangePasswordRequest, LoginRequest, LoginResponse, SessionResponse, change_password, login,
    logout, me, refresh,
};
pub use misc::{HealthResponse, health};
pub use users::{create_user, delete_user, get_user, list_users, update_user};
