//! Authentication middleware and token issuing.

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::{debug, warn};
use std::sync::Arc;

use super::{AuthConfig, AuthError, Claims, PasswordHasher};
use crate::user::{User, UserRole};

/// Extract a Bearer token from an Authorization header value.
fn bearer_token_from_header(header_value: &str) -> Result<&str, AuthError> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::InvalidAuthHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = parts.next().ok_or(AuthError::InvalidAuthHeader)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }

    if parts.next().is_some() {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok(token)
}

fn token_from_cookie_header<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name && !value.trim().is_empty() {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// Authentication state shared across handlers.
#[derive(Clone)]
pub struct AuthState {
    config: Arc<AuthConfig>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    hasher: PasswordHasher,
}

impl AuthState {
    /// Create auth state from a validated config.
    ///
    /// Resolves `env:VAR_NAME` in `jwt_secret`. In dev mode a missing secret
    /// is replaced by a random per-process one, so tokens do not survive a
    /// restart.
    pub fn new(config: AuthConfig) -> anyhow::Result<Self> {
        let secret = match config.resolve_jwt_secret()? {
            Some(secret) => secret,
            None if config.dev_mode => {
                warn!("no JWT secret configured; generating an ephemeral dev secret");
                AuthConfig::generate_jwt_secret()
            }
            None => return Err(super::ConfigValidationError::MissingJwtSecret.into()),
        };
        let hasher = config.password_hasher()?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            config: Arc::new(config),
            hasher,
        })
    }

    /// Check if dev mode is enabled.
    pub fn is_dev_mode(&self) -> bool {
        self.config.dev_mode
    }

    /// Get allowed CORS origins from config.
    pub fn allowed_origins(&self) -> &[String] {
        &self.config.allowed_origins
    }

    /// Password hasher configured for this deployment.
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// Issue a token for `user`, deriving role and organization scope from it.
    pub fn issue_token(&self, user: &User) -> Result<(String, Claims), AuthError> {
        let claims = Claims::for_user(
            user,
            &self.config.issuer,
            Utc::now(),
            Duration::seconds(self.config.token_ttl_secs),
        );
        let token = self.encode_claims(&claims)?;
        Ok((token, claims))
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Validate a JWT token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            warn!("JWT validation failed: {:?}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// `Set-Cookie` value carrying `token`.
    ///
    /// The `Secure` flag is omitted in dev mode so http://localhost works.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax;{} Max-Age={}",
            self.config.cookie_name,
            token,
            self.secure_flag(),
            self.config.token_ttl_secs
        )
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax;{} Max-Age=0",
            self.config.cookie_name,
            self.secure_flag()
        )
    }

    fn secure_flag(&self) -> &'static str {
        if self.config.dev_mode { "" } else { " Secure;" }
    }
}

/// Authenticated caller extracted from request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Session claims.
    pub claims: Claims,
}

impl CurrentUser {
    /// Get the user ID.
    pub fn id(&self) -> &str {
        &self.claims.sub
    }

    /// Get the user's role.
    pub fn role(&self) -> UserRole {
        self.claims.role
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.claims.organization_id.as_deref()
    }

    /// Check if user is admin.
    pub fn is_admin(&self) -> bool {
        self.claims.is_admin()
    }

    pub fn can_manage_organization(&self, organization_id: Option<&str>) -> bool {
        self.claims.can_manage_organization(organization_id)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// Authentication middleware.
///
/// Validates JWT tokens and injects `CurrentUser` into request extensions.
/// Token sources in priority order:
/// 1. Authorization: Bearer <token> header
/// 2. session cookie
///
/// A `token` query parameter is ignored.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let cookie_token = req
        .headers()
        .get(axum::http::header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookie_header| token_from_cookie_header(cookie_header, auth.cookie_name()));

    let claims = if let Some(header) = auth_header {
        let token = bearer_token_from_header(header)?;
        auth.validate_token(token)?
    } else if let Some(token) = cookie_token {
        auth.validate_token(token)?
    } else {
        return Err(AuthError::MissingAuthHeader);
    };

    debug!("authenticated {} ({})", claims.sub, claims.role);

    req.extensions_mut().insert(CurrentUser { claims });

    Ok(next.run(req).await)
}

/// Require admin role.
///
/// Use as an extractor in handlers that require admin access.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions(
                "admin role required".to_string(),
            ));
        }

        Ok(RequireAdmin(user))
    }
}

#[cfg(test)]
#[allow(clippy::field_reassign_with_default)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-for-unit-tests-minimum-32-chars-long";

    fn test_state() -> AuthState {
        let mut config = AuthConfig::default();
        config.jwt_secret = Some(SECRET.to_string());
        AuthState::new(config).unwrap()
    }

    fn test_user(role: UserRole, organization_id: Option<&str>) -> User {
        User {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            password: String::new(),
            display_name: "U1".to_string(),
            role,
            organization_id: organization_id.map(str::to_string),
            is_active: true,
            created_at: "2024-01-01".to_string(),
            updated_at: "2024-01-01".to_string(),
            last_login_at: None,
        }
    }

    #[test]
    fn test_bearer_token_from_header_valid() {
        assert_eq!(
            bearer_token_from_header("Bearer abc.def.ghi").unwrap(),
            "abc.def.ghi"
        );
        assert_eq!(
            bearer_token_from_header("bearer   token123").unwrap(),
            "token123"
        );
        assert_eq!(
            bearer_token_from_header("   Bearer\tmixed-case ").unwrap(),
            "mixed-case"
        );
    }

    #[test]
    fn test_bearer_token_from_header_invalid() {
        let cases = [
            "",
            "Bearer",
            "Bearer ",
            "Token something",
            "Bearer token extra",
            "bear token",
        ];

        for case in cases {
            assert!(
                bearer_token_from_header(case).is_err(),
                "{case} should fail"
            );
        }
    }

    #[test]
    fn test_token_from_cookie() {
        assert_eq!(
            token_from_cookie_header("theme=dark; auth_token=abc.def; x=1", "auth_token"),
            Some("abc.def")
        );
        assert_eq!(token_from_cookie_header("auth_token=", "auth_token"), None);
        assert_eq!(token_from_cookie_header("other=1", "auth_token"), None);
        assert_eq!(token_from_cookie_header("token=abc.def", "auth_token"), None);
    }

    #[test]
    fn test_issue_and_validate_token() {
        let state = test_state();
        let user = test_user(UserRole::Admin, Some("org1"));

        let (token, issued) = state.issue_token(&user).unwrap();
        let claims = state.validate_token(&token).unwrap();

        assert_eq!(claims, issued);
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.organization_id.as_deref(), Some("org1"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let state = test_state();
        let user = test_user(UserRole::Parent, None);
        let claims = Claims::for_user(
            &user,
            "swimdesk",
            Utc::now() - Duration::hours(3),
            Duration::hours(1),
        );
        let token = state.encode_claims(&claims).unwrap();

        assert!(matches!(
            state.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let state = test_state();
        let mut other_config = AuthConfig::default();
        other_config.jwt_secret = Some("another-secret-that-is-also-32-chars-long".to_string());
        let other = AuthState::new(other_config).unwrap();

        let (token, _) = other.issue_token(&test_user(UserRole::Admin, None)).unwrap();
        assert!(matches!(
            state.validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(state.validate_token("garbage").is_err());
    }

    #[test]
    fn test_missing_secret_outside_dev_mode() {
        assert!(AuthState::new(AuthConfig::default()).is_err());

        let mut dev = AuthConfig::default();
        dev.dev_mode = true;
        let state = AuthState::new(dev).unwrap();
        let (token, _) = state.issue_token(&test_user(UserRole::Parent, None)).unwrap();
        assert!(state.validate_token(&token).is_ok());
    }

    #[test]
    fn test_session_cookie_flags() {
        let state = test_state();
        let cookie = state.session_cookie("tok");
        assert!(cookie.starts_with("auth_token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));

        let cleared = state.clear_cookie();
        assert!(cleared.starts_with("auth_token=;"));
        assert!(cleared.contains("Max-Age=0"));
    }

    #[test]
    fn test_current_user() {
        let user = test_user(UserRole::Admin, Some("org1"));
        let claims = Claims::for_user(&user, "swimdesk", Utc::now(), Duration::hours(1));

        let current = CurrentUser { claims };
        assert_eq!(current.id(), "u1");
        assert_eq!(current.role(), UserRole::Admin);
        assert_eq!(current.organization_id(), Some("org1"));
        assert!(current.is_admin());
        assert!(current.can_manage_organization(Some("org1")));
        assert!(!current.can_manage_organization(Some("org2")));
    }
}
