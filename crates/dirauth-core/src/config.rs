//! Configuration for Dirauth

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirauthConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub user_info: UserInfoConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DirauthConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DIRAUTH_SERVER_URL") {
            config.directory.server_url = url;
        }
        if std::env::var("DIRAUTH_START_TLS").map(|v| v == "true").unwrap_or(false) {
            config.directory.start_tls = true;
        }
        if let Ok(dn) = std::env::var("DIRAUTH_BIND_DN") {
            config.directory.bind_dn = Some(dn);
        }
        if let Ok(password) = std::env::var("DIRAUTH_BIND_PASSWORD") {
            config.directory.bind_password = Some(password);
        }
        if let Ok(base) = std::env::var("DIRAUTH_BASE_DN") {
            config.directory.base_dn = base;
        }
        if let Ok(domain) = std::env::var("DIRAUTH_DOMAIN") {
            config.directory.domain = domain;
        }
        if let Ok(fqdn) = std::env::var("DIRAUTH_FQDN") {
            config.directory.fqdn = Some(fqdn);
        }
        if let Ok(timeout) = std::env::var("DIRAUTH_TIMEOUT_SECONDS") {
            if let Ok(t) = timeout.parse() {
                config.directory.timeout_seconds = t;
            }
        }
        if let Ok(concurrency) = std::env::var("DIRAUTH_MEMBERSHIP_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                config.directory.membership_concurrency = c;
            }
        }
        if let Ok(groups) = std::env::var("DIRAUTH_ALLOW_GROUPS") {
            config.policy.allow_groups = Some(split_list(&groups));
        }
        if let Ok(groups) = std::env::var("DIRAUTH_REFUSE_GROUPS") {
            config.policy.refuse_groups = Some(split_list(&groups));
        }
        if let Ok(groups) = std::env::var("DIRAUTH_ADMIN_GROUPS") {
            config.policy.admin_groups = Some(split_list(&groups));
        }
        if std::env::var("DIRAUTH_MAIL_ROLES").map(|v| v == "true").unwrap_or(false) {
            config.policy.derive_mail_roles = true;
        }
        if let Ok(level) = std::env::var("DIRAUTH_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("DIRAUTH_LOG_FORMAT") {
            config.logging.format = format;
        }

        config
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.directory.validate()?;
        self.policy.validate()?;
        Ok(())
    }
}

/// Groups in environment variables are separated by `;` because DNs contain commas
fn split_list(raw: &str) -> BTreeSet<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Directory
// ============================================================================

/// Directory server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Server URL (ldap:// or ldaps://)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Upgrade plain connections with STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Service account used by the `groups` and `probe` commands
    #[serde(default)]
    pub bind_dn: Option<String>,

    #[serde(default)]
    pub bind_password: Option<String>,

    /// Default search base
    /// Example: "DC=corp,DC=local"
    #[serde(default)]
    pub base_dn: String,

    /// Mail domain stripped from logins, e.g. "company.com"
    #[serde(default)]
    pub domain: String,

    /// Directory domain appended when binding; defaults to `domain`
    #[serde(default)]
    pub fqdn: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Per-operation timeout in seconds
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_seconds: u64,

    /// Parent-group lookups issued concurrently per traversal level
    #[serde(default = "default_membership_concurrency")]
    pub membership_concurrency: usize,

    #[serde(default)]
    pub filters: FilterTemplates,
}

fn default_server_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_operation_timeout() -> u64 {
    30
}

fn default_membership_concurrency() -> usize {
    1
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            start_tls: false,
            skip_tls_verify: false,
            bind_dn: None,
            bind_password: None,
            base_dn: String::new(),
            domain: String::new(),
            fqdn: None,
            timeout_seconds: default_timeout(),
            operation_timeout_seconds: default_operation_timeout(),
            membership_concurrency: default_membership_concurrency(),
            filters: FilterTemplates::default(),
        }
    }
}

impl DirectoryConfig {
    /// Directory domain used for `user@fqdn` binds, if any
    pub fn bind_domain(&self) -> Option<&str> {
        match self.fqdn.as_deref() {
            Some(fqdn) if !fqdn.is_empty() => Some(fqdn),
            _ if !self.domain.is_empty() => Some(&self.domain),
            _ => None,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }

    pub fn validate(&self) -> crate::Result<()> {
        let url = url::Url::parse(&self.server_url).map_err(|e| {
            crate::Error::InvalidConfig(format!("Invalid server URL {}: {}", self.server_url, e))
        })?;

        if url.scheme() != "ldap" && url.scheme() != "ldaps" {
            return Err(crate::Error::InvalidConfig(
                "Server URL must start with ldap:// or ldaps://".into(),
            ));
        }

        if self.start_tls && url.scheme() == "ldaps" {
            return Err(crate::Error::InvalidConfig(
                "STARTTLS cannot be combined with an ldaps:// URL".into(),
            ));
        }

        if self.bind_dn.is_some() && self.bind_password.is_none() {
            return Err(crate::Error::InvalidConfig(
                "bind_dn is set but bind_password is missing".into(),
            ));
        }

        if self.membership_concurrency == 0 {
            return Err(crate::Error::InvalidConfig(
                "membership_concurrency must be at least 1".into(),
            ));
        }

        self.filters.validate()
    }
}

/// Search filter templates.
///
/// `{identifier}` and `{group}` are replaced with escaped values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTemplates {
    #[serde(default = "default_user_lookup")]
    pub user_lookup: String,

    #[serde(default = "default_group_catalog")]
    pub group_catalog: String,

    #[serde(default = "default_group_parent")]
    pub group_parent: String,
}

fn default_user_lookup() -> String {
    "(|(userprincipalname={identifier})(sAMAccountName={identifier}))".to_string()
}

fn default_group_catalog() -> String {
    "(&(objectClass=Group))".to_string()
}

fn default_group_parent() -> String {
    "(&(objectClass=group)(member={group}))".to_string()
}

impl Default for FilterTemplates {
    fn default() -> Self {
        Self {
            user_lookup: default_user_lookup(),
            group_catalog: default_group_catalog(),
            group_parent: default_group_parent(),
        }
    }
}

impl FilterTemplates {
    pub fn validate(&self) -> crate::Result<()> {
        if !self.user_lookup.contains("{identifier}") {
            return Err(crate::Error::InvalidConfig(
                "user_lookup filter must contain {identifier} placeholder".into(),
            ));
        }
        if !self.group_parent.contains("{group}") {
            return Err(crate::Error::InvalidConfig(
                "group_parent filter must contain {group} placeholder".into(),
            ));
        }
        if self.group_catalog.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "group_catalog filter is required".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Group-based access policy.
///
/// Groups may be listed by DN or by short name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Whitelist: when set, only members of one of these groups may log in
    #[serde(default)]
    pub allow_groups: Option<BTreeSet<String>>,

    /// Blacklist: members of any of these groups are refused
    #[serde(default)]
    pub refuse_groups: Option<BTreeSet<String>>,

    /// Members of these groups receive the `admin` role
    #[serde(default)]
    pub admin_groups: Option<BTreeSet<String>>,

    /// Group DN, short name or mail local part -> role
    #[serde(default)]
    pub role_map: Option<BTreeMap<String, String>>,

    /// Use group mail local parts as roles
    #[serde(default)]
    pub derive_mail_roles: bool,

    /// Force membership loading on or off. When unset it is enabled as soon as
    /// any group-based rule is configured.
    #[serde(default)]
    pub load_groups: Option<bool>,
}

impl PolicyConfig {
    /// Whether a `memberOf` entry must be present before policy evaluation
    pub fn membership_required(&self) -> bool {
        self.load_groups.unwrap_or_else(|| self.has_group_rules())
    }

    pub fn has_group_rules(&self) -> bool {
        self.allow_groups.is_some()
            || self.refuse_groups.is_some()
            || self.admin_groups.is_some()
            || self.role_map.is_some()
            || self.derive_mail_roles
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.load_groups == Some(false) && self.has_group_rules() {
            return Err(crate::Error::InvalidConfig(
                "group rules are configured but load_groups is disabled".into(),
            ));
        }

        if let Some(map) = &self.role_map {
            if let Some((key, _)) = map.iter().find(|(_, role)| role.is_empty()) {
                return Err(crate::Error::InvalidConfig(format!(
                    "role_map entry {} maps to an empty role",
                    key
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// User info
// ============================================================================

/// Attribute projection for the user info loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfoConfig {
    /// Directory attribute -> user data field
    #[serde(default = "default_user_attributes")]
    pub attributes: BTreeMap<String, String>,

    /// Load `thumbnailPhoto` as a data URI under the `thumbnail` key
    #[serde(default)]
    pub load_thumbnail: bool,
}

fn default_user_attributes() -> BTreeMap<String, String> {
    [
        ("givenName", "firstName"),
        ("sn", "lastName"),
        ("name", "fullName"),
        ("mail", "mail"),
        ("company", "company"),
        ("streetAddress", "street"),
        ("l", "city"),
        ("postalCode", "zip"),
        ("c", "country"),
        ("st", "state"),
        ("mobile", "mobile"),
        ("manager", "manager"),
        ("department", "department"),
        ("sAMAccountName", "sAMAccountName"),
        ("userPrincipalName", "UPN"),
        ("proxyAddresses", "proxyAddresses"),
        ("location", "ldapLocation"),
        ("pwdLastSet", "changePasswordOnLogon"),
        ("objectSid", "sid"),
    ]
    .into_iter()
    .map(|(attr, field)| (attr.to_string(), field.to_string()))
    .collect()
}

impl Default for UserInfoConfig {
    fn default() -> Self {
        Self {
            attributes: default_user_attributes(),
            load_thumbnail: false,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// pretty, compact or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
