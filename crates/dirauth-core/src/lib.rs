//! Dirauth Core Library
//!
//! Configuration, error taxonomy and the shared data model for directory-backed
//! authentication: group records, membership maps, accumulated user data and the
//! principal handed back to the host application.

pub mod config;
pub mod error;
pub mod types;

pub use config::{DirauthConfig, PolicyConfig};
pub use error::{DirectoryError, Error, ForbiddenKind, Result};

/// Dirauth version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reserved user data key holding the resolved membership map
pub const MEMBER_OF_KEY: &str = "memberOf";

/// User data key holding the normalized login name
pub const USERNAME_KEY: &str = "username";

/// User data key holding the directory domain used for binding
pub const FQDN_KEY: &str = "fqdn";

/// Optional user data key overriding the principal id
pub const ID_KEY: &str = "id";

/// Role granted to members of the configured admin groups
pub const ADMIN_ROLE: &str = "admin";
