//! Authentication module.
//!
//! Provides:
//! - bcrypt credential hashing with fail-closed verification
//! - session claims carrying role and organization scope
//! - JWT issuing/validation middleware and request extractors

mod claims;
mod config;
mod error;
mod middleware;
pub mod password;

pub use claims::Claims;
pub use config::{AuthConfig, ConfigValidationError};
pub use error::AuthError;
pub use middleware::{AuthState, CurrentUser, RequireAdmin, auth_middleware};
pub use password::PasswordHasher;
