//! User repository for database operations.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{CreateUserRequest, UpdateUserRequest, User, UserListQuery, UserRole};
use super::store::UserStore;
use crate::db::is_unique_violation;

const USER_COLUMNS: &str = "id, email, password, display_name, role, organization_id, \
     is_active, created_at, updated_at, last_login_at";

/// Turn a write error into a conflict message when the email is taken.
fn write_error(err: sqlx::Error, email: Option<&str>, context: &'static str) -> anyhow::Error {
    match email {
        Some(email) if is_unique_violation(&err) => {
            anyhow::anyhow!("Email '{}' is already registered.", email)
        }
        _ => anyhow::Error::new(err).context(context),
    }
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Generate a new user ID.
    fn generate_id() -> String {
        format!("usr_{}", nanoid::nanoid!(12))
    }

    /// Create a new user. `request.password` must already be hashed.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let id = Self::generate_id();
        let display_name = request
            .display_name
            .unwrap_or_else(|| request.email.clone());
        let role = request.role.unwrap_or_default();

        debug!("Creating user: {} ({})", request.email, id);

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password, display_name, role, organization_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.email)
        .bind(&request.password)
        .bind(&display_name)
        .bind(role.as_str())
        .bind(&request.organization_id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, Some(&request.email), "Failed to insert user"))?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        Ok(user)
    }

    /// Get a user by email (case-insensitive).
    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;

        Ok(user)
    }

    /// List users with optional filters.
    #[instrument(skip(self))]
    pub async fn list(&self, query: UserListQuery) -> Result<Vec<User>> {
        let limit = query.limit.unwrap_or(100);
        let offset = query.offset.unwrap_or(0);

        let mut sql = format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1");
        let mut bind_values: Vec<String> = Vec::new();

        if let Some(role) = &query.role {
            sql.push_str(" AND role = ?");
            bind_values.push(role.to_string());
        }

        if let Some(organization_id) = &query.organization_id {
            sql.push_str(" AND organization_id = ?");
            bind_values.push(organization_id.clone());
        }

        if let Some(is_active) = query.is_active {
            sql.push_str(" AND is_active = ?");
            bind_values.push(if is_active { "1" } else { "0" }.to_string());
        }

        if let Some(search) = &query.search {
            sql.push_str(" AND (email LIKE ? OR display_name LIKE ?)");
            let pattern = format!("%{}%", search);
            bind_values.push(pattern.clone());
            bind_values.push(pattern);
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?");

        let mut query_builder = sqlx::query_as::<_, User>(&sql);
        for value in &bind_values {
            query_builder = query_builder.bind(value);
        }
        query_builder = query_builder.bind(limit).bind(offset);

        let users = query_builder
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        Ok(users)
    }

    /// Update a user. `request.password`, if set, must already be hashed.
    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdateUserRequest) -> Result<User> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {}", id))?;

        let mut updates = Vec::new();
        let mut values: Vec<Option<String>> = Vec::new();

        if let Some(email) = &request.email {
            updates.push("email = ?");
            values.push(Some(email.clone()));
        }

        if let Some(password) = &request.password {
            updates.push("password = ?");
            values.push(Some(password.clone()));
        }

        if let Some(display_name) = &request.display_name {
            updates.push("display_name = ?");
            values.push(Some(display_name.clone()));
        }

        if let Some(role) = &request.role {
            updates.push("role = ?");
            values.push(Some(role.to_string()));
        }

        if let Some(organization_id) = &request.organization_id {
            updates.push("organization_id = ?");
            values.push(organization_id.clone());
        }

        if let Some(is_active) = request.is_active {
            updates.push("is_active = ?");
            values.push(Some(if is_active { "1" } else { "0" }.to_string()));
        }

        if updates.is_empty() {
            return Ok(existing);
        }

        updates.push("updated_at = datetime('now')");

        let sql = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));

        let mut query_builder = sqlx::query(&sql);
        for value in &values {
            query_builder = query_builder.bind(value);
        }
        query_builder = query_builder.bind(id);

        query_builder
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, request.email.as_deref(), "Failed to update user"))?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    /// Replace one user's stored password.
    #[instrument(skip(self, password))]
    pub async fn set_password(&self, id: &str, password: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET password = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(password)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update password")?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("User not found: {}", id));
        }

        Ok(())
    }

    /// Delete a user.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("User not found: {}", id));
        }

        Ok(())
    }

    /// Update last login timestamp.
    #[instrument(skip(self))]
    pub async fn update_last_login(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update last login")?;

        Ok(())
    }

    /// Check if an email is available.
    #[instrument(skip(self))]
    pub async fn is_email_available(&self, email: &str) -> Result<bool> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ? COLLATE NOCASE")
                .bind(email)
                .fetch_one(&self.pool)
                .await
                .context("Failed to check email availability")?;

        Ok(count.0 == 0)
    }

    /// Count users by role.
    #[instrument(skip(self))]
    pub async fn count_by_role(&self, role: UserRole) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users by role")?;

        Ok(count.0)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY id ASC");
        sqlx::query_as::<_, User>(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query users with role {role}"))
    }

    async fn update_password(&self, id: &str, password: &str) -> Result<()> {
        self.set_password(id, password).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_repo() -> UserRepository {
        let db = Database::in_memory().await.unwrap();
        UserRepository::new(db.pool().clone())
    }

    fn request(email: &str, role: Option<UserRole>, org: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: "hashed_password".to_string(),
            display_name: None,
            role,
            organization_id: org.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_repo().await;

        let user = repo
            .create(request("coach@example.com", Some(UserRole::Instructor), Some("org1")))
            .await
            .unwrap();
        assert!(user.id.starts_with("usr_"));
        assert_eq!(user.email, "coach@example.com");
        assert_eq!(user.display_name, "coach@example.com");
        assert_eq!(user.role, UserRole::Instructor);
        assert_eq!(user.organization_id.as_deref(), Some("org1"));
        assert!(user.is_active);

        let fetched = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, user.id);

        let by_email = repo
            .get_by_email("COACH@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(repo.get("usr_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = setup_repo().await;
        repo.create(request("dup@example.com", None, None))
            .await
            .unwrap();
        assert!(!repo.is_email_available("dup@example.com").await.unwrap());
        assert!(repo.create(request("dup@example.com", None, None)).await.is_err());
    }

    /// Uniqueness holds at the storage layer, not only in the service check.
    #[tokio::test]
    async fn test_duplicate_email_differing_in_case_rejected() {
        let repo = setup_repo().await;
        let first = repo
            .create(request("Coach@example.com", None, None))
            .await
            .unwrap();

        let err = repo
            .create(request("coach@example.com", None, None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already registered"), "{err:#}");

        let other = repo
            .create(request("other@example.com", None, None))
            .await
            .unwrap();
        let err = repo
            .update(
                &other.id,
                UpdateUserRequest {
                    email: Some("COACH@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already registered"), "{err:#}");

        let found = repo.get_by_email("COACH@EXAMPLE.COM").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_update_user() {
        let repo = setup_repo().await;
        let user = repo
            .create(request("update@example.com", None, Some("org1")))
            .await
            .unwrap();

        let update = UpdateUserRequest {
            display_name: Some("Updated Name".to_string()),
            role: Some(UserRole::Admin),
            organization_id: Some(None),
            ..Default::default()
        };

        let updated = repo.update(&user.id, update).await.unwrap();
        assert_eq!(updated.display_name, "Updated Name");
        assert_eq!(updated.role, UserRole::Admin);
        assert_eq!(updated.organization_id, None);

        let untouched = repo
            .update(&user.id, UpdateUserRequest::default())
            .await
            .unwrap();
        assert_eq!(untouched.display_name, "Updated Name");

        assert!(
            repo.update("usr_missing", UpdateUserRequest::default())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_delete_user() {
        let repo = setup_repo().await;
        let user = repo
            .create(request("delete@example.com", None, None))
            .await
            .unwrap();

        repo.delete(&user.id).await.unwrap();
        assert!(repo.get(&user.id).await.unwrap().is_none());

        let err = repo.delete(&user.id).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_list_users() {
        let repo = setup_repo().await;

        for i in 0..5 {
            let role = if i == 0 {
                Some(UserRole::Admin)
            } else {
                Some(UserRole::Parent)
            };
            let org = if i % 2 == 0 { Some("org1") } else { Some("org2") };
            repo.create(request(&format!("user{}@example.com", i), role, org))
                .await
                .unwrap();
        }

        let all = repo.list(UserListQuery::default()).await.unwrap();
        assert_eq!(all.len(), 5);

        let admins = repo
            .list(UserListQuery {
                role: Some(UserRole::Admin),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(admins.len(), 1);

        let org1 = repo
            .list(UserListQuery {
                organization_id: Some("org1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(org1.len(), 3);

        let search = repo
            .list(UserListQuery {
                search: Some("user2".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(search.len(), 1);

        assert_eq!(repo.count_by_role(UserRole::Parent).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_store_find_by_role_and_update_password() {
        let repo = setup_repo().await;
        let coach = repo
            .create(request("a@example.com", Some(UserRole::Instructor), None))
            .await
            .unwrap();
        repo.create(request("b@example.com", Some(UserRole::Parent), None))
            .await
            .unwrap();

        let instructors = repo.find_by_role(UserRole::Instructor).await.unwrap();
        assert_eq!(instructors.len(), 1);
        assert_eq!(instructors[0].id, coach.id);

        repo.update_password(&coach.id, "new_hash").await.unwrap();
        assert_eq!(repo.get(&coach.id).await.unwrap().unwrap().password, "new_hash");

        assert!(repo.update_password("usr_missing", "x").await.is_err());
    }
}
