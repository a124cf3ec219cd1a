//! User service for business logic.

use std::sync::{Arc, OnceLock};

use anyhow::{Result, bail};
use tracing::{info, instrument, warn};

use super::models::{CreateUserRequest, UpdateUserRequest, User, UserListQuery, UserRole};
use super::repository::UserRepository;
use crate::auth::PasswordHasher;
use crate::auth::password::is_hash;

const MIN_PASSWORD_LEN: usize = 8;

/// Plaintext behind the hash checked when a login has no usable stored hash.
const DUMMY_PASSWORD: &str = "swimdesk-no-such-account";

/// Service for user management operations.
#[derive(Debug, Clone)]
pub struct UserService {
    repo: UserRepository,
    hasher: PasswordHasher,
    /// Hash of [`DUMMY_PASSWORD`] at the hasher's cost, computed on first use.
    dummy_hash: Arc<OnceLock<String>>,
}

impl UserService {
    /// Create a new user service.
    pub fn new(repo: UserRepository, hasher: PasswordHasher) -> Self {
        Self {
            repo,
            hasher,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn repository(&self) -> &UserRepository {
        &self.repo
    }

    /// Create a new user with validation. The plaintext password is hashed
    /// before it is stored.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        let email = request.email.trim().to_string();
        if !is_valid_email(&email) {
            bail!("Invalid email format.");
        }

        if !self.repo.is_email_available(&email).await? {
            bail!("Email '{}' is already registered.", email);
        }

        validate_password(&request.password)?;

        let processed_request = CreateUserRequest {
            email,
            password: self.hasher.hash(&request.password)?,
            ..request
        };

        let user = self.repo.create(processed_request).await?;
        info!(user_id = %user.id, role = %user.role, "Created new user");

        Ok(user)
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.repo.get(id).await
    }

    /// List users with optional filters.
    #[instrument(skip(self))]
    pub async fn list_users(&self, query: UserListQuery) -> Result<Vec<User>> {
        self.repo.list(query).await
    }

    /// Update a user. A new plaintext password is hashed before it is stored.
    #[instrument(skip(self, request))]
    pub async fn update_user(&self, id: &str, request: UpdateUserRequest) -> Result<User> {
        let mut processed_request = request;

        if let Some(email) = processed_request.email.take() {
            let email = email.trim().to_string();
            if !is_valid_email(&email) {
                bail!("Invalid email format.");
            }
            if let Some(existing) = self.repo.get_by_email(&email).await? {
                if existing.id != id {
                    bail!("Email '{}' is already registered.", email);
                }
            }
            processed_request.email = Some(email);
        }

        if let Some(password) = &processed_request.password {
            validate_password(password)?;
            processed_request.password = Some(self.hasher.hash(password)?);
        }

        let user = self.repo.update(id, processed_request).await?;
        info!(user_id = %user.id, "Updated user");

        Ok(user)
    }

    /// Delete a user.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: &str) -> Result<()> {
        if self.repo.get(id).await?.is_none() {
            bail!("User not found: {}", id);
        }

        self.repo.delete(id).await?;
        warn!(user_id = %id, "Deleted user");

        Ok(())
    }

    /// Verify login credentials.
    ///
    /// Returns `None` for an unknown email, an inactive account, a wrong
    /// password or a stored value that is not a usable hash, without saying
    /// which. Every path runs one bcrypt verification at the configured cost.
    #[instrument(skip(self, password))]
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let user = self.repo.get_by_email(email.trim()).await?;

        match user {
            Some(user) if user.is_active && is_hash(&user.password) => {
                if self.hasher.verify(password, &user.password) {
                    self.repo.update_last_login(&user.id).await?;
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            _ => {
                self.verify_dummy(password);
                Ok(None)
            }
        }
    }

    /// Spend the same bcrypt work as a real check, for logins that have no
    /// hash to check against.
    fn verify_dummy(&self, password: &str) {
        let dummy = self.dummy_hash.get_or_init(|| {
            self.hasher.hash(DUMMY_PASSWORD).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to compute dummy password hash");
                String::new()
            })
        });
        self.hasher.verify(password, dummy);
    }

    /// Change a user's own password after checking the current one.
    ///
    /// Returns `false` when the current password does not verify.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(&self, id: &str, current: &str, new: &str) -> Result<bool> {
        let user = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {}", id))?;

        if !self.hasher.verify(current, &user.password) {
            return Ok(false);
        }

        validate_password(new)?;
        self.repo.set_password(id, &self.hasher.hash(new)?).await?;
        info!(user_id = %id, "Changed password");

        Ok(true)
    }

    /// Count users per role.
    #[instrument(skip(self))]
    pub async fn role_counts(&self) -> Result<Vec<(UserRole, i64)>> {
        let mut counts = Vec::with_capacity(UserRole::ALL.len());
        for role in UserRole::ALL {
            counts.push((role, self.repo.count_by_role(role).await?));
        }
        Ok(counts)
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {} characters.", MIN_PASSWORD_LEN);
    }
    // bcrypt only reads the first 72 bytes.
    if password.len() > 72 {
        bail!("Password must be at most 72 bytes.");
    }
    Ok(())
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    !parts[0].is_empty() && parts[1].contains('.') && !email.contains(char::is_whitespace)
}
