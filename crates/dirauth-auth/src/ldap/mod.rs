//! LDAP / Active Directory backend
//!
//! Implements the directory capability on top of `ldap3`: a connector that
//! opens and binds one connection per login, and the bound session the
//! resolution engine searches through.

mod client;
mod types;

pub use client::{LdapDirectory, LdapSession};
pub use types::*;
