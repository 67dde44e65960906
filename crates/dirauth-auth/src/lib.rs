//! Directory-backed authentication for Dirauth
//!
//! Binds a user against LDAP / Active Directory, resolves nested group
//! membership, applies group-based access rules and derives roles.

pub mod authenticator;
pub mod catalog;
pub mod directory;
pub mod filter;
pub mod handlers;
pub mod ldap;
pub mod membership;
pub mod metrics;
pub mod name;
pub mod policy;
pub mod sid;
pub mod username;

#[cfg(test)]
mod testing;

pub use authenticator::{Authenticator, AuthenticatorBuilder};
pub use catalog::GroupCatalog;
pub use directory::{
    DirectoryConnector, DirectoryEntry, DirectoryQuery, DirectoryResult, SearchRequest,
    SearchScope,
};
pub use filter::Filters;
pub use handlers::{EnrichmentHandler, HandlerRegistry};
pub use ldap::{DirectoryStatus, LdapDirectory, LdapSession, ServerInfo};
pub use membership::{MembershipOutcome, MembershipResolver};
pub use name::extract_name;
pub use policy::{assert_access, derive_roles, AccessPolicy};
pub use username::{NormalizeUsername, UsernameNormalizer};
