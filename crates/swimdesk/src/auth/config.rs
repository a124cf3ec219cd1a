//! Authentication configuration.

use serde::{Deserialize, Serialize};

use super::password::{self, PasswordHasher};

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Development mode: relaxes secret and cost checks and drops the
    /// `Secure` cookie flag so plain-http localhost works.
    pub dev_mode: bool,

    /// JWT secret for HS256. Accepts `env:VAR_NAME` indirection.
    /// REQUIRED when dev_mode is false.
    pub jwt_secret: Option<String>,

    /// Issuer written into every token.
    pub issuer: String,

    /// Token lifetime in seconds.
    pub token_ttl_secs: i64,

    /// Bcrypt cost for newly hashed passwords.
    pub bcrypt_cost: u32,

    /// Name of the cookie carrying the session token.
    pub cookie_name: String,

    /// Allowed CORS origins. If empty, CORS is disabled.
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            // No default JWT secret - must be explicitly configured
            jwt_secret: None,
            issuer: "swimdesk".to_string(),
            token_ttl_secs: 60 * 60 * 24,
            bcrypt_cost: password::DEFAULT_COST,
            cookie_name: "auth_token".to_string(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl AuthConfig {
    /// Resolve the JWT secret, expanding `env:VAR_NAME` syntax.
    /// Returns the resolved secret or None if not configured.
    pub fn resolve_jwt_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        match &self.jwt_secret {
            None => Ok(None),
            Some(value) => {
                if let Some(var_name) = value.strip_prefix("env:") {
                    match std::env::var(var_name) {
                        Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                        Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
                        Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
                    }
                } else {
                    Ok(Some(value.clone()))
                }
            }
        }
    }

    /// Validate the configuration for the current mode.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.token_ttl_secs <= 0 {
            return Err(ConfigValidationError::InvalidTokenTtl(self.token_ttl_secs));
        }

        if PasswordHasher::new(self.bcrypt_cost).is_err() {
            return Err(ConfigValidationError::BcryptCostOutOfRange(self.bcrypt_cost));
        }

        if self.dev_mode {
            return Ok(());
        }

        if self.bcrypt_cost < password::MIN_COST {
            return Err(ConfigValidationError::BcryptCostTooLow(self.bcrypt_cost));
        }

        let secret = self
            .resolve_jwt_secret()?
            .ok_or(ConfigValidationError::MissingJwtSecret)?;
        if secret.len() < 32 {
            return Err(ConfigValidationError::JwtSecretTooShort);
        }

        Ok(())
    }

    /// Build the password hasher for this configuration.
    pub fn password_hasher(&self) -> Result<PasswordHasher, ConfigValidationError> {
        PasswordHasher::new(self.bcrypt_cost)
            .map_err(|_| ConfigValidationError::BcryptCostOutOfRange(self.bcrypt_cost))
    }

    /// Generate a random JWT secret from the OS-seeded thread RNG.
    pub fn generate_jwt_secret() -> String {
        use rand::Rng;

        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        const SECRET_LENGTH: usize = 64;

        let mut rng = rand::rng();
        (0..SECRET_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// JWT secret is required in production mode.
    MissingJwtSecret,
    /// JWT secret is too short (minimum 32 characters).
    JwtSecretTooShort,
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
    /// Bcrypt cost outside bcrypt's supported range.
    BcryptCostOutOfRange(u32),
    /// Bcrypt cost below the production floor.
    BcryptCostTooLow(u32),
    /// Token lifetime must be positive.
    InvalidTokenTtl(i64),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingJwtSecret => {
                write!(
                    f,
                    "JWT secret is required when dev_mode is false. Set SWIMDESK__AUTH__JWT_SECRET or auth.jwt_secret in config."
                )
            }
            Self::JwtSecretTooShort => {
                write!(f, "JWT secret must be at least 32 characters long.")
            }
            Self::EnvVarNotFound(var) => {
                write!(
                    f,
                    "Environment variable '{}' not found (referenced via env:{} in config).",
                    var, var
                )
            }
            Self::EnvVarEmpty(var) => {
                write!(
                    f,
                    "Environment variable '{}' is empty (referenced via env:{} in config).",
                    var, var
                )
            }
            Self::BcryptCostOutOfRange(cost) => {
                write!(f, "bcrypt cost {} is outside the supported range 4-31.", cost)
            }
            Self::BcryptCostTooLow(cost) => {
                write!(
                    f,
                    "bcrypt cost {} is below the minimum of {} outside dev mode.",
                    cost,
                    password::MIN_COST
                )
            }
            Self::InvalidTokenTtl(ttl) => {
                write!(f, "token_ttl_secs must be positive (got {}).", ttl)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

#[cfg(test)]
#[allow(clippy::field_reassign_with_default)]
mod tests {
    use super::*;

    const GOOD_SECRET: &str = "a-sufficiently-long-secret-for-hs256-tokens";

    #[test]
    fn test_default_requires_secret() {
        let config = AuthConfig::default();
        assert_eq!(config.validate(), Err(ConfigValidationError::MissingJwtSecret));
    }

    #[test]
    fn test_valid_production_config() {
        let mut config = AuthConfig::default();
        config.jwt_secret = Some(GOOD_SECRET.to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = AuthConfig::default();
        config.jwt_secret = Some("short".to_string());
        assert_eq!(config.validate(), Err(ConfigValidationError::JwtSecretTooShort));
    }

    #[test]
    fn test_low_cost_rejected_outside_dev_mode() {
        let mut config = AuthConfig::default();
        config.jwt_secret = Some(GOOD_SECRET.to_string());
        config.bcrypt_cost = 4;
        assert_eq!(config.validate(), Err(ConfigValidationError::BcryptCostTooLow(4)));

        config.dev_mode = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cost_out_of_range_rejected_in_any_mode() {
        let mut config = AuthConfig::default();
        config.dev_mode = true;
        config.bcrypt_cost = 40;
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::BcryptCostOutOfRange(40))
        );
        assert!(config.password_hasher().is_err());
    }

    #[test]
    fn test_missing_env_secret() {
        let mut config = AuthConfig::default();
        config.jwt_secret = Some("env:SWIMDESK_TEST_SECRET_THAT_IS_NOT_SET".to_string());
        assert_eq!(
            config.resolve_jwt_secret(),
            Err(ConfigValidationError::EnvVarNotFound(
                "SWIMDESK_TEST_SECRET_THAT_IS_NOT_SET".to_string()
            ))
        );
    }

    #[test]
    fn test_generate_jwt_secret() {
        let a = AuthConfig::generate_jwt_secret();
        let b = AuthConfig::generate_jwt_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
