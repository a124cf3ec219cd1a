//! Application state shared across handlers.

use crate::auth::AuthState;
use crate::user::UserService;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// User service for account management and credential checks.
    pub users: UserService,
    /// Token issuing and validation.
    pub auth: AuthState,
}

impl AppState {
    pub fn new(users: UserService, auth: AuthState) -> Self {
        Self { users, auth }
    }
}
