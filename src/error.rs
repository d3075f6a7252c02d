//! Application error types for registry-composer
//!
//! This module defines the error types shared across modules.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::auth::HashError;
use crate::config::ConfigError;
use crate::storage::StorageError;

/// Errors raised while composing a repository slice
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Repository type not known to the registry
    #[error("Unsupported repository type '{0}'")]
    UnsupportedType(String),

    /// Settings do not match what the repository type expects
    #[error("Malformed settings for repository '{repo}': {reason}")]
    MalformedSettings {
        /// Repository name
        repo: String,
        /// What is wrong
        reason: String,
    },

    /// A group member failed to compose
    #[error("Group member '{member}' failed: {source}")]
    GroupMember {
        /// Member name
        member: String,
        /// Failure of the member
        #[source]
        source: Box<ComposeError>,
    },

    /// A group reaches itself
    #[error("Cyclic group: {}", .0.join(" -> "))]
    CyclicGroup(Vec<String>),

    /// No configuration for the repository
    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Authenticator could not be resolved
    #[error("Authentication setup failed: {0}")]
    Auth(String),
}

impl ComposeError {
    /// Shorthand for `MalformedSettings`
    pub fn malformed(repo: impl Into<String>, reason: impl Into<String>) -> Self {
        ComposeError::MalformedSettings {
            repo: repo.into(),
            reason: reason.into(),
        }
    }

    /// Innermost error below any group member wrapping
    pub fn root(&self) -> &ComposeError {
        match self {
            ComposeError::GroupMember { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Outbound HTTP client errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// The client was shut down
    #[error("HTTP client is closed")]
    Closed,

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request timed out
    #[error("Request timed out")]
    Timeout,

    /// The connection could not be established
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Any other transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The client could not be created
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

/// HTTP server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the listen address failed
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Listen address
        addr: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an error
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Application-level error type
///
/// This is the error type used by the binary.
/// It aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Composition error
    #[error("Composition error: {0}")]
    Compose(#[from] ComposeError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Client(#[from] ClientError),

    /// Server error
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Password hashing error
    #[error("Hash error: {0}")]
    Hash(#[from] HashError),
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Timeout => true,
            ClientError::Connect(_) => true,

            ClientError::Closed => false,
            ClientError::InvalidRequest(_) => false,
            ClientError::Network(_) => false,
            ClientError::Build(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_error_messages() {
        assert_eq!(
            ComposeError::UnsupportedType("cargo".to_string()).to_string(),
            "Unsupported repository type 'cargo'"
        );
        assert_eq!(
            ComposeError::malformed("group", "missing repositories").to_string(),
            "Malformed settings for repository 'group': missing repositories"
        );
        assert_eq!(
            ComposeError::CyclicGroup(vec!["a".into(), "b".into(), "a".into()]).to_string(),
            "Cyclic group: a -> b -> a"
        );
        assert_eq!(
            ComposeError::RepoNotFound("central".to_string()).to_string(),
            "Repository not found: central"
        );
    }

    #[test]
    fn test_group_member_root() {
        let err = ComposeError::GroupMember {
            member: "outer".to_string(),
            source: Box::new(ComposeError::GroupMember {
                member: "inner".to_string(),
                source: Box::new(ComposeError::UnsupportedType("cargo".to_string())),
            }),
        };

        assert!(err.to_string().starts_with("Group member 'outer' failed: "));
        assert!(matches!(
            err.root(),
            ComposeError::UnsupportedType(t) if t == "cargo"
        ));
    }

    #[test]
    fn test_compose_error_from_config_error() {
        let err: ComposeError = ConfigError::InvalidValue("layout".to_string()).into();
        assert!(matches!(err, ComposeError::Config(_)));
    }

    #[test]
    fn test_client_error_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Connect("refused".to_string()).is_retryable());
        assert!(!ClientError::Closed.is_retryable());
        assert!(!ClientError::Network("reset".to_string()).is_retryable());
        assert!(!ClientError::InvalidRequest("url".to_string()).is_retryable());
    }

    #[test]
    fn test_app_error_from_module_errors() {
        let err: AppError = ClientError::Closed.into();
        assert_eq!(err.to_string(), "HTTP client error: HTTP client is closed");

        let err: AppError = ComposeError::RepoNotFound("x".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Composition error: Repository not found: x"
        );

        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: AppError = ServerError::Bind {
            addr: "0.0.0.0:8080".to_string(),
            source: io,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Server error: Failed to bind 0.0.0.0:8080: in use"
        );
    }
}
