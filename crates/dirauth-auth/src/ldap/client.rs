//! LDAP client
//!
//! Opens one connection per bind. LDAP, LDAPS and STARTTLS are supported.

use crate::directory::{
    DirectoryConnector, DirectoryEntry, DirectoryQuery, DirectoryResult, SearchRequest,
    SearchScope,
};
use crate::ldap::types::{DirectoryStatus, ServerInfo};
use async_trait::async_trait;
use dirauth_core::config::DirectoryConfig;
use dirauth_core::{DirectoryError, Error, Result};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, ResultEntry, Scope, SearchEntry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Invalid credentials
const RC_INVALID_CREDENTIALS: u32 = 49;
/// Unwilling to perform; AD answers this for disabled or locked accounts
const RC_UNWILLING_TO_PERFORM: u32 = 53;

const ROOT_DSE_ATTRIBUTES: [&str; 5] = [
    "vendorName",
    "vendorVersion",
    "namingContexts",
    "supportedLDAPVersion",
    "defaultNamingContext",
];

/// Connector for a configured LDAP server
#[derive(Debug, Clone)]
pub struct LdapDirectory {
    config: DirectoryConfig,
}

impl LdapDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Session bound with the configured service account, or anonymous
    pub async fn service_session(&self) -> Result<LdapSession> {
        let bind_dn = self.config.bind_dn.as_deref().unwrap_or_default();
        let password = self.config.bind_password.as_deref().unwrap_or_default();

        let mut ldap = self.create_connection().await?;
        if !bind_dn.is_empty() {
            let result = ldap
                .simple_bind(bind_dn, password)
                .await
                .map_err(|e| DirectoryError::Bind(format!("service bind failed: {}", e)))?;
            if result.rc != 0 {
                let _ = ldap.unbind().await;
                return Err(DirectoryError::Bind(format!(
                    "service bind failed with code {}: {}",
                    result.rc, result.text
                ))
                .into());
            }
        }

        Ok(self.session(ldap))
    }

    /// Service bind followed by a root DSE query
    pub async fn probe(&self) -> Result<ServerInfo> {
        let session = self.service_session().await?;
        let request = SearchRequest::subtree("(objectClass=*)")
            .with_base("")
            .with_scope(SearchScope::Base)
            .with_attrs(ROOT_DSE_ATTRIBUTES);

        let entry = session.search_one(&request).await;
        session.close().await;

        Ok(match entry? {
            Some(entry) => ServerInfo::from(&entry),
            None => ServerInfo {
                supported_ldap_version: vec!["3".to_string()],
                ..Default::default()
            },
        })
    }

    pub async fn status(&self) -> DirectoryStatus {
        let (server_info, error) = match self.probe().await {
            Ok(info) => (Some(info), None),
            Err(e) => (None, Some(e.to_string())),
        };

        DirectoryStatus {
            connected: server_info.is_some(),
            server_url: self.config.server_url.clone(),
            checked_at: chrono::Utc::now().to_rfc3339(),
            error,
            server_info,
        }
    }

    async fn create_connection(&self) -> DirectoryResult<Ldap> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connect_timeout())
            .set_starttls(self.config.start_tls)
            .set_no_tls_verify(self.config.skip_tls_verify);

        debug!(server = %self.config.server_url, "Connecting to LDAP server");

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.server_url)
            .await
            .map_err(|e| DirectoryError::Connect(e.to_string()))?;

        ldap3::drive!(conn);
        Ok(ldap)
    }

    fn session(&self, ldap: Ldap) -> LdapSession {
        LdapSession {
            ldap,
            base_dn: self.config.base_dn.clone(),
            timeout: self.config.operation_timeout(),
        }
    }
}

#[async_trait]
impl DirectoryConnector for LdapDirectory {
    async fn bind(&self, bind_name: &str, password: &str) -> Result<Arc<dyn DirectoryQuery>> {
        // An empty password would be an unauthenticated bind, which servers accept
        if password.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let mut ldap = self.create_connection().await?;
        let result = ldap
            .simple_bind(bind_name, password)
            .await
            .map_err(|e| DirectoryError::Bind(e.to_string()))?;

        match result.rc {
            0 => Ok(Arc::new(self.session(ldap))),
            RC_INVALID_CREDENTIALS | RC_UNWILLING_TO_PERFORM => {
                let _ = ldap.unbind().await;
                debug!(bind_name, rc = result.rc, "Bind rejected");
                Err(Error::InvalidCredentials)
            }
            rc => {
                let _ = ldap.unbind().await;
                Err(DirectoryError::Bind(format!("bind failed with code {}: {}", rc, result.text)).into())
            }
        }
    }
}

/// A bound LDAP connection
pub struct LdapSession {
    ldap: Ldap,
    base_dn: String,
    timeout: Duration,
}

impl LdapSession {
    fn search_error(&self, filter: &str, err: LdapError) -> DirectoryError {
        match err {
            LdapError::Timeout { .. } => DirectoryError::Timeout(self.timeout),
            other => DirectoryError::Search {
                filter: filter.to_string(),
                message: other.to_string(),
            },
        }
    }
}

fn scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

/// Search result entries, skipping continuation references and intermediate
/// messages. AD returns references for other partitions of the forest.
fn entries_only(entries: Vec<ResultEntry>) -> Vec<DirectoryEntry> {
    entries
        .into_iter()
        .filter(|entry| {
            if entry.is_ref() {
                trace!("Skipping search reference");
                return false;
            }
            !entry.is_intermediate()
        })
        .map(|entry| DirectoryEntry::from(SearchEntry::construct(entry)))
        .collect()
}

#[async_trait]
impl DirectoryQuery for LdapSession {
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>> {
        let base = request.base.as_deref().unwrap_or(&self.base_dn);
        let attrs: Vec<&str> = if request.attrs.is_empty() {
            vec!["*"]
        } else {
            request.attrs.iter().map(String::as_str).collect()
        };

        let mut ldap = self.ldap.clone();
        let (entries, _res) = ldap
            .with_timeout(self.timeout)
            .search(base, scope(request.scope), &request.filter, attrs)
            .await
            .map_err(|e| self.search_error(&request.filter, e))?
            .success()
            .map_err(|e| self.search_error(&request.filter, e))?;

        debug!(filter = %request.filter, entries = entries.len(), "LDAP search");

        Ok(entries_only(entries))
    }

    async fn close(&self) {
        let mut ldap = self.ldap.clone();
        if let Err(e) = ldap.unbind().await {
            warn!(error = %e, "LDAP unbind failed");
        }
    }
}
