//! LDAP result types

use crate::directory::DirectoryEntry;
use ldap3::SearchEntry;
use serde::Serialize;

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
            bin_attrs: entry.bin_attrs,
        }
    }
}

/// Root DSE information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub naming_contexts: Vec<String>,
    pub supported_ldap_version: Vec<String>,
    pub default_naming_context: Option<String>,
}

impl From<&DirectoryEntry> for ServerInfo {
    fn from(entry: &DirectoryEntry) -> Self {
        let all = |name: &str| entry.attr(name).map(<[String]>::to_vec).unwrap_or_default();

        Self {
            vendor: entry.first("vendorName").map(str::to_string),
            version: entry.first("vendorVersion").map(str::to_string),
            naming_contexts: all("namingContexts"),
            supported_ldap_version: all("supportedLDAPVersion"),
            default_naming_context: entry.first("defaultNamingContext").map(str::to_string),
        }
    }
}

/// Connectivity report for a configured directory
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryStatus {
    /// Whether the service bind and root DSE query succeeded
    pub connected: bool,
    pub server_url: String,
    pub checked_at: String,
    pub error: Option<String>,
    pub server_info: Option<ServerInfo>,
}
