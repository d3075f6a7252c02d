//! User credentials
//!
//! Passwords are stored as Argon2id hashes in PHC format inside a YAML file:
//!
//! ```yaml
//! credentials:
//!   alice:
//!     pass: "$argon2id$v=19$m=19456,t=2,p=1$..."
//! ```

use std::collections::HashMap;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use serde::Deserialize;

use super::{AuthUser, Authentication};
use crate::config::ConfigError;

/// Hash a password using Argon2id
///
/// # Example
///
/// ```
/// use registry_composer::auth::credentials::{hash_password, verify_password};
///
/// let hash = hash_password("s3cret").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// assert!(verify_password("s3cret", &hash));
/// ```
pub fn hash_password(password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::HashFailed(e.to_string()))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Error type for password hashing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HashError {
    /// Hashing failed
    #[error("Hash failed: {0}")]
    HashFailed(String),
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    credentials: HashMap<String, UserEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    pass: String,
}

/// Users with hashed passwords
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    users: HashMap<String, String>,
}

impl Credentials {
    /// Parse a credentials file
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: CredentialsFile = serde_yaml::from_str(yaml)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse credentials: {}", e)))?;
        Ok(Self {
            users: file
                .credentials
                .into_iter()
                .map(|(name, entry)| (name, entry.pass))
                .collect(),
        })
    }

    /// Add a user with an already hashed password
    pub fn with_user(mut self, name: impl Into<String>, hash: impl Into<String>) -> Self {
        self.users.insert(name.into(), hash.into());
        self
    }

    /// Number of users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns true if there are no users
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Authentication for Credentials {
    fn user(&self, name: &str, password: &str) -> Option<AuthUser> {
        self.users
            .get(name)
            .filter(|hash| verify_password(password, hash))
            .map(|_| AuthUser::new(name))
    }
}

/// Single user with a plain password, taken from the environment
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    name: String,
    password: String,
}

impl EnvCredentials {
    /// Variable holding the user name
    pub const NAME_VAR: &'static str = "REGISTRY_COMPOSER_USER_NAME";

    /// Variable holding the password
    pub const PASS_VAR: &'static str = "REGISTRY_COMPOSER_USER_PASS";

    /// Read the user from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let name = std::env::var(Self::NAME_VAR)
            .map_err(|_| ConfigError::MissingRequired(Self::NAME_VAR.to_string()))?;
        let password = std::env::var(Self::PASS_VAR)
            .map_err(|_| ConfigError::MissingRequired(Self::PASS_VAR.to_string()))?;
        Ok(Self { name, password })
    }
}

impl Authentication for EnvCredentials {
    fn user(&self, name: &str, password: &str) -> Option<AuthUser> {
        (name == self.name && password == self.password).then(|| AuthUser::new(name))
    }
}
