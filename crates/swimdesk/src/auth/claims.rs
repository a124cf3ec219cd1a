//! Session claims derived from an authenticated user.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::user::{User, UserRole};

/// JWT claims carried by every authenticated request.
///
/// Role and organization scope are copied from the user at issue time so
/// authorization checks need no store lookup. They are never edited on a
/// live token; a refresh derives a new set from the current user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,

    /// User's email.
    pub email: String,

    /// User's role.
    pub role: UserRole,

    /// Organization the user belongs to. Serialized as `null` when absent.
    #[serde(default)]
    pub organization_id: Option<String>,

    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,

    /// Issued at (as Unix timestamp).
    pub iat: i64,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,

    /// JWT ID.
    #[serde(default)]
    pub jti: Option<String>,
}

impl Claims {
    /// Derive claims for `user`, valid for `ttl` from `now`.
    pub fn for_user(user: &User, issuer: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            organization_id: user.organization_id.clone(),
            iss: Some(issuer.to_string()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Whether the session belongs to `organization_id`.
    pub fn belongs_to(&self, organization_id: &str) -> bool {
        self.organization_id.as_deref() == Some(organization_id)
    }

    /// Whether this session may administer records of `organization_id`.
    ///
    /// Admins without an organization are global; scoped admins only manage
    /// their own organization. `None` is a record with no organization,
    /// which only global admins may touch.
    pub fn can_manage_organization(&self, organization_id: Option<&str>) -> bool {
        if !self.is_admin() {
            return false;
        }
        match (&self.organization_id, organization_id) {
            (None, _) => true,
            (Some(own), Some(other)) => own == other,
            (Some(_), None) => false,
        }
    }
}
