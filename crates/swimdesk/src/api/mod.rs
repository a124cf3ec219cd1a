//! HTTP API module.
//!
//! Login and session endpoints plus organization-scoped user administration.

mod error;
pub mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
