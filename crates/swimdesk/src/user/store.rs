//! Store seam used by batch jobs.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{User, UserRole};

/// Minimal user store needed by credential maintenance.
///
/// Implemented by [`super::UserRepository`] for sqlite and by in-memory
/// fakes in tests.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users with the given role.
    async fn find_by_role(&self, role: UserRole) -> Result<Vec<User>>;

    /// Replace the stored password of one user, keyed by id.
    async fn update_password(&self, id: &str, password: &str) -> Result<()>;
}
