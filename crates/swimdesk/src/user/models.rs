//! User data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User role enumeration.
///
/// Stored and serialized as the upper-case role name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    /// Swim instructor teaching lessons.
    Instructor,
    /// Parent or guardian managing children's enrolments.
    #[default]
    Parent,
    /// Organization administrator.
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Instructor, UserRole::Parent, UserRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Instructor => "INSTRUCTOR",
            UserRole::Parent => "PARENT",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INSTRUCTOR" => Ok(UserRole::Instructor),
            "PARENT" => Ok(UserRole::Parent),
            "ADMIN" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// User entity from database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Stored credential. Expected to be a bcrypt hash; legacy rows may
    /// still hold plaintext until the repair job has processed them.
    #[serde(skip_serializing)]
    pub password: String,
    pub display_name: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub organization_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub last_login_at: Option<String>,
}

/// Public user info (safe to return to clients).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub organization_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            organization_id: user.organization_id,
            is_active: user.is_active,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Request to create a new user.
///
/// `password` is plaintext here; the service hashes it before it reaches
/// the repository.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub role: Option<UserRole>,
    pub organization_id: Option<String>,
}

/// Request to update an existing user.
///
/// `organization_id` uses a nested option so that `null` clears the
/// organization while an absent field leaves it untouched.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<UserRole>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub organization_id: Option<Option<String>>,
    pub is_active: Option<bool>,
}

fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// User list query parameters.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub organization_id: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
