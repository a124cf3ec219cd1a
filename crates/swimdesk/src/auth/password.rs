//! Password hashing and verification.
//!
//! Stored credentials are bcrypt strings (`$2b$<cost>$<salt><digest>`), so the
//! salt and cost travel with the hash and verification needs nothing else.

use anyhow::{Context, Result, bail};

/// Lowest cost accepted for account passwords in production configuration.
pub const MIN_COST: u32 = 10;

/// Lowest cost used when the repair job rewrites stored credentials.
pub const REPAIR_MIN_COST: u32 = 12;

/// Cost used when nothing else is configured.
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

const BCRYPT_MIN_COST: u32 = 4;
const BCRYPT_MAX_COST: u32 = 31;
const BCRYPT_HASH_LEN: usize = 60;
const BCRYPT_VERSIONS: [&str; 4] = ["2a", "2b", "2x", "2y"];

/// Bcrypt password hasher with a fixed cost factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    /// Create a hasher. `cost` must be within bcrypt's range (4..=31).
    pub fn new(cost: u32) -> Result<Self> {
        if !(BCRYPT_MIN_COST..=BCRYPT_MAX_COST).contains(&cost) {
            bail!(
                "Invalid bcrypt cost {}: must be between {} and {}.",
                cost,
                BCRYPT_MIN_COST,
                BCRYPT_MAX_COST
            );
        }
        Ok(Self { cost })
    }

    /// Return a hasher whose cost is at least `floor`.
    pub fn with_min_cost(self, floor: u32) -> Self {
        Self {
            cost: self.cost.max(floor),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost).context("Failed to hash password")
    }

    /// Verify a plaintext password against a stored hash.
    ///
    /// Anything that is not a well-formed hash (including legacy plaintext)
    /// fails closed and returns `false`.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        verify(password, stored)
    }
}

/// Verify a plaintext password against a stored hash, failing closed.
///
/// The comparison itself is constant-time inside the `bcrypt` crate.
pub fn verify(password: &str, stored: &str) -> bool {
    if !is_hash(stored) {
        return false;
    }
    bcrypt::verify(password, stored).unwrap_or(false)
}

/// Whether `value` has the shape of a bcrypt hash.
///
/// Checks the version tag, a two-digit cost in bcrypt's range and 53
/// characters of bcrypt's base64 alphabet. It does not prove the digest
/// matches any password.
pub fn is_hash(value: &str) -> bool {
    if value.len() != BCRYPT_HASH_LEN || !value.is_ascii() {
        return false;
    }

    let mut parts = value.splitn(4, '$');
    let (Some(""), Some(version), Some(cost), Some(rest)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    if !BCRYPT_VERSIONS.contains(&version) {
        return false;
    }

    if cost.len() != 2 || !cost.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let cost: u32 = match cost.parse() {
        Ok(cost) => cost,
        Err(_) => return false,
    };
    if !(BCRYPT_MIN_COST..=BCRYPT_MAX_COST).contains(&cost) {
        return false;
    }

    rest.len() == 53
        && rest
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'/')
}
