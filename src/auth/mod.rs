//! Authentication and authorization for repository slices
//!
//! This module provides:
//! - The `Authentication` trait resolving Basic credentials to a user
//! - Per-repository `Permissions`
//! - Argon2 hashed credential files and a single environment user
//! - The `authorize` check used by backends before serving a request

pub mod credentials;
pub mod permissions;

pub use credentials::{hash_password, verify_password, Credentials, EnvCredentials, HashError};
pub use permissions::{Action, FreePermissions, LoggingPermissions, Permissions, YamlPermissions};

use std::sync::Arc;

use tracing::info;

use crate::slice::{SliceRequest, SliceResponse};

/// Name reported for requests without credentials
pub const ANONYMOUS: &str = "anonymous";

/// Authenticated (or anonymous) user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthUser {
    /// User name
    pub name: String,
}

impl AuthUser {
    /// Create a named user
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// User of requests that carry no credentials
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS)
    }

    /// Returns true for the anonymous user
    pub fn is_anonymous(&self) -> bool {
        self.name == ANONYMOUS
    }
}

/// Resolves a user from a name and password
#[cfg_attr(test, mockall::automock)]
pub trait Authentication: Send + Sync {
    /// Returns the user if the credentials are valid
    fn user(&self, name: &str, password: &str) -> Option<AuthUser>;
}

/// Rejects every credential pair; all requests stay anonymous
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuth;

impl Authentication for AnonymousAuth {
    fn user(&self, _name: &str, _password: &str) -> Option<AuthUser> {
        None
    }
}

/// Logs the result of every authentication attempt
pub struct LoggingAuth {
    origin: Arc<dyn Authentication>,
}

impl LoggingAuth {
    /// Wrap an authentication source
    pub fn new(origin: Arc<dyn Authentication>) -> Self {
        Self { origin }
    }
}

impl Authentication for LoggingAuth {
    fn user(&self, name: &str, password: &str) -> Option<AuthUser> {
        let user = self.origin.user(name, password);
        match &user {
            Some(_) => info!(user = %name, "Authentication succeeded"),
            None => info!(user = %name, "Authentication failed"),
        }
        user
    }
}

/// Check that the request may perform `action`
///
/// Requests without an Authorization header are treated as anonymous.
/// Invalid credentials and anonymous users without permission get 401 so
/// that clients retry with credentials; authenticated users without
/// permission get 403.
pub fn authorize(
    request: &SliceRequest,
    auth: &dyn Authentication,
    permissions: &dyn Permissions,
    action: Action,
) -> Result<AuthUser, SliceResponse> {
    let user = match request.basic_credentials() {
        Some((name, password)) => auth
            .user(&name, &password)
            .ok_or_else(SliceResponse::unauthorized)?,
        None => AuthUser::anonymous(),
    };

    if permissions.allowed(&user, action) {
        Ok(user)
    } else if user.is_anonymous() {
        Err(SliceResponse::unauthorized())
    } else {
        Err(SliceResponse::forbidden())
    }
}
