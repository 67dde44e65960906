//! Error types for Dirauth

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which list rejected the login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenKind {
    /// Member of a refused group
    Blacklist,
    /// Not a member of any allowed group
    Whitelist,
}

impl ForbiddenKind {
    pub fn code(&self) -> &'static str {
        match self {
            ForbiddenKind::Blacklist => "Forbidden.Blacklist",
            ForbiddenKind::Whitelist => "Forbidden.Whitelist",
        }
    }
}

impl fmt::Display for ForbiddenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForbiddenKind::Blacklist => f.write_str("blacklist"),
            ForbiddenKind::Whitelist => f.write_str("whitelist"),
        }
    }
}

/// Failures reported by the directory capability.
///
/// These are surfaced to callers unchanged and never retried here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Failed to connect to directory server: {0}")]
    Connect(String),

    #[error("Directory bind failed: {0}")]
    Bind(String),

    #[error("Directory search failed for filter {filter}: {message}")]
    Search { filter: String, message: String },

    #[error("Directory operation timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum Error {
    /// Bind rejected. Deliberately says nothing about which credential was wrong.
    #[error("Username or password is not valid")]
    InvalidCredentials,

    /// Setup defect, e.g. memberships were required but never loaded
    #[error("Possible configuration error: {0}")]
    Configuration(String),

    #[error("{}", forbidden_message(*kind, group.as_deref()))]
    Forbidden {
        kind: ForbiddenKind,
        group: Option<String>,
    },

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn forbidden_message(kind: ForbiddenKind, group: Option<&str>) -> String {
    match (kind, group) {
        (ForbiddenKind::Blacklist, Some(group)) => {
            format!("Members of {} are not allowed to login", group)
        }
        (ForbiddenKind::Blacklist, None) => "Member of a refused group".to_string(),
        (ForbiddenKind::Whitelist, _) => {
            "You are not member of allowed groups that can login".to_string()
        }
    }
}

impl Error {
    pub fn blacklisted(group: impl Into<String>) -> Self {
        Error::Forbidden {
            kind: ForbiddenKind::Blacklist,
            group: Some(group.into()),
        }
    }

    pub fn not_whitelisted() -> Self {
        Error::Forbidden {
            kind: ForbiddenKind::Whitelist,
            group: None,
        }
    }

    /// Stable reason code for the host framework
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredentials => "InvalidCredentials",
            Error::Configuration(_) => "ConfigurationError",
            Error::Forbidden { kind, .. } => kind.code(),
            Error::Directory(_) => "DirectoryError",
            Error::InvalidConfig(_) => "InvalidConfig",
        }
    }

    /// True for policy-driven denials, false for setup or transport problems
    pub fn is_denial(&self) -> bool {
        matches!(self, Error::InvalidCredentials | Error::Forbidden { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinguishable() {
        assert_eq!(Error::InvalidCredentials.code(), "InvalidCredentials");
        assert_eq!(
            Error::Configuration("memberships not loaded".into()).code(),
            "ConfigurationError"
        );
        assert_eq!(Error::blacklisted("CN=X").code(), "Forbidden.Blacklist");
        assert_eq!(Error::not_whitelisted().code(), "Forbidden.Whitelist");
        assert_eq!(
            Error::from(DirectoryError::Timeout(Duration::from_secs(5))).code(),
            "DirectoryError"
        );
    }

    #[test]
    fn test_blacklist_message_names_group() {
        let err = Error::blacklisted("CN=Contractors,OU=Groups");
        assert_eq!(
            err.to_string(),
            "Members of CN=Contractors,OU=Groups are not allowed to login"
        );
        assert!(err.is_denial());
        assert!(!Error::Configuration("x".into()).is_denial());
    }

    #[test]
    fn test_invalid_credentials_is_generic() {
        let message = Error::InvalidCredentials.to_string();
        assert!(!message.to_lowercase().contains("password is wrong"));
        assert_eq!(message, "Username or password is not valid");
    }
}
