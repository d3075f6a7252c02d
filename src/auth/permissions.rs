//! Repository permissions

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::AuthUser;
use crate::config::ConfigError;

/// User name granting a rule to everybody, including anonymous users
pub const ANY_USER: &str = "*";

/// Operation a request performs on a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Download or list
    Read,
    /// Upload
    Write,
    /// Remove
    Delete,
    /// Every action
    All,
}

impl Action {
    /// Action of an HTTP method, if the method is supported
    pub fn from_method(method: &str) -> Option<Action> {
        match method {
            "GET" | "HEAD" => Some(Action::Read),
            "PUT" | "POST" | "PATCH" => Some(Action::Write),
            "DELETE" => Some(Action::Delete),
            _ => None,
        }
    }

    fn grants(self, requested: Action) -> bool {
        self == Action::All || self == requested
    }
}

impl std::str::FromStr for Action {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" | "download" => Ok(Action::Read),
            "write" | "upload" => Ok(Action::Write),
            "delete" => Ok(Action::Delete),
            "*" => Ok(Action::All),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown permission '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
            Action::All => "*",
        };
        f.write_str(name)
    }
}

/// Permission check consulted per request
#[cfg_attr(test, mockall::automock)]
pub trait Permissions: Send + Sync {
    /// Returns true if the user may perform the action
    fn allowed(&self, user: &AuthUser, action: Action) -> bool;
}

/// Permits everything
#[derive(Debug, Clone, Copy, Default)]
pub struct FreePermissions;

impl Permissions for FreePermissions {
    fn allowed(&self, _user: &AuthUser, _action: Action) -> bool {
        true
    }
}

/// Default permission set of repositories without a `permissions` section
pub fn free() -> Arc<dyn Permissions> {
    Arc::new(FreePermissions)
}

/// Per-user actions from a repository configuration
///
/// ```yaml
/// permissions:
///   alice: [read, write]
///   "*": [read]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YamlPermissions {
    rules: HashMap<String, Vec<Action>>,
}

impl YamlPermissions {
    /// Parse raw rules
    pub fn from_rules(raw: &HashMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut rules = HashMap::new();
        for (user, actions) in raw {
            let actions = actions
                .iter()
                .map(|action| action.parse())
                .collect::<Result<Vec<Action>, _>>()?;
            rules.insert(user.clone(), actions);
        }
        Ok(Self { rules })
    }

    fn grants(&self, user: &str, action: Action) -> bool {
        self.rules
            .get(user)
            .map(|actions| actions.iter().any(|granted| granted.grants(action)))
            .unwrap_or(false)
    }
}

impl Permissions for YamlPermissions {
    fn allowed(&self, user: &AuthUser, action: Action) -> bool {
        self.grants(ANY_USER, action) || self.grants(&user.name, action)
    }
}

/// Logs every permission decision of the wrapped permission set
pub struct LoggingPermissions {
    origin: Arc<dyn Permissions>,
}

impl LoggingPermissions {
    /// Wrap a permission set
    pub fn new(origin: Arc<dyn Permissions>) -> Self {
        Self { origin }
    }
}

impl Permissions for LoggingPermissions {
    fn allowed(&self, user: &AuthUser, action: Action) -> bool {
        let allowed = self.origin.allowed(user, action);
        debug!(user = %user.name, action = %action, allowed, "Permission check");
        allowed
    }
}
