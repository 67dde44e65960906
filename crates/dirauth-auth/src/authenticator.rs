//! Authentication orchestration
//!
//! One login: normalize the username, bind, run the enrichment handlers in
//! registration order against the bound session, check access and derive roles,
//! then build the [`Principal`]. Any failure aborts the login.

use crate::directory::{DirectoryConnector, DirectoryQuery};
use crate::filter::Filters;
use crate::handlers::{
    EnrichmentHandler, GroupsLoader, HandlerRegistry, ThumbnailLoader, UserInfoLoader,
    THUMBNAIL_KEY, USER_INFO_KEY,
};
use crate::ldap::LdapDirectory;
use crate::metrics;
use crate::policy::AccessPolicy;
use crate::username::{bind_name, NormalizeUsername, UsernameNormalizer};
use dirauth_core::config::{DirectoryConfig, UserInfoConfig};
use dirauth_core::types::{Principal, UserData};
use dirauth_core::{DirauthConfig, Error, PolicyConfig, Result, MEMBER_OF_KEY};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Directory-backed authenticator
pub struct Authenticator {
    connector: Arc<dyn DirectoryConnector>,
    normalizer: Arc<dyn NormalizeUsername>,
    fqdn: Option<String>,
    handlers: HandlerRegistry,
    policy: AccessPolicy,
}

impl Authenticator {
    pub fn builder(connector: Arc<dyn DirectoryConnector>) -> AuthenticatorBuilder {
        AuthenticatorBuilder::new(connector)
    }

    /// LDAP-backed authenticator with the default handlers
    pub fn from_config(config: &DirauthConfig) -> Result<Self> {
        let connector = Arc::new(LdapDirectory::new(config.directory.clone()));
        Self::builder(connector)
            .directory(config.directory.clone())
            .policy(config.policy.clone())
            .user_info(config.user_info.clone())
            .build()
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Authenticate a credential pair
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Principal> {
        let request_id = Uuid::new_v4();
        let span = info_span!("authenticate", request_id = %request_id);
        let started = Instant::now();

        let result = self.run(username, password).instrument(span).await;

        let outcome = match &result {
            Ok(_) => "Success",
            Err(e) => e.code(),
        };
        metrics::record_authentication(outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn run(&self, raw_username: &str, password: &str) -> Result<Principal> {
        let username = self.normalizer.normalize(raw_username);
        if username.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let bind_as = bind_name(&username, self.fqdn.as_deref());
        let session = match self.connector.bind(&bind_as, password).await {
            Ok(session) => session,
            Err(Error::InvalidCredentials) => {
                info!(username = %username, "Bind rejected");
                return Err(Error::InvalidCredentials);
            }
            Err(e) => {
                warn!(username = %username, error = %e, "Bind failed");
                return Err(e);
            }
        };

        let data = UserData::for_user(&username, self.fqdn.as_deref().unwrap_or_default());
        let enriched = self.enrich(session.as_ref(), data).await;
        session.close().await;
        let data = enriched?;

        if let Err(e) = self.policy.assert_access(&data) {
            match &e {
                Error::Configuration(reason) => {
                    error!(username = %username, reason = %reason, "Possible configuration error")
                }
                _ => info!(username = %username, code = e.code(), "Access denied"),
            }
            return Err(e);
        }

        let roles = self.policy.derive_roles(&data);
        let principal = Principal::from_user_data(data, roles);
        info!(username = %username, id = %principal.id, roles = ?principal.roles, "Authenticated");
        Ok(principal)
    }

    async fn enrich(&self, session: &dyn DirectoryQuery, mut data: UserData) -> Result<UserData> {
        for (name, handler) in self.handlers.iter() {
            match handler.load(session, &data).await? {
                Some(value) => {
                    debug!(handler = name, "Handler produced data");
                    data.insert(name, value);
                }
                None => debug!(handler = name, "Handler produced nothing"),
            }
        }
        Ok(data)
    }
}

/// Wires an [`Authenticator`].
///
/// Default handlers are chosen at build time: `userinfo` always, `memberOf`
/// when the policy needs memberships, `thumbnail` when enabled. Handlers added
/// with [`handler`](Self::handler) run after the defaults, except that reusing
/// a default name replaces that handler in place.
pub struct AuthenticatorBuilder {
    connector: Arc<dyn DirectoryConnector>,
    directory: DirectoryConfig,
    policy: PolicyConfig,
    user_info: UserInfoConfig,
    normalizer: Option<Arc<dyn NormalizeUsername>>,
    extra: Vec<(String, Arc<dyn EnrichmentHandler>)>,
    removed: Vec<String>,
}

impl AuthenticatorBuilder {
    pub fn new(connector: Arc<dyn DirectoryConnector>) -> Self {
        Self {
            connector,
            directory: DirectoryConfig::default(),
            policy: PolicyConfig::default(),
            user_info: UserInfoConfig::default(),
            normalizer: None,
            extra: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn directory(mut self, config: DirectoryConfig) -> Self {
        self.directory = config;
        self
    }

    pub fn policy(mut self, config: PolicyConfig) -> Self {
        self.policy = config;
        self
    }

    pub fn user_info(mut self, config: UserInfoConfig) -> Self {
        self.user_info = config;
        self
    }

    pub fn normalizer(mut self, normalizer: impl NormalizeUsername + 'static) -> Self {
        self.normalizer = Some(Arc::new(normalizer));
        self
    }

    pub fn handler(mut self, name: impl Into<String>, handler: Arc<dyn EnrichmentHandler>) -> Self {
        self.extra.push((name.into(), handler));
        self
    }

    pub fn without_handler(mut self, name: impl Into<String>) -> Self {
        self.removed.push(name.into());
        self
    }

    pub fn build(self) -> Result<Authenticator> {
        self.policy.validate()?;

        let filters = Filters::new(self.directory.filters.clone());
        let fqdn = self.directory.bind_domain().map(str::to_string);

        let mut handlers = HandlerRegistry::new();
        handlers.register(
            USER_INFO_KEY,
            Arc::new(UserInfoLoader::new(filters.clone(), &self.user_info)),
        );
        if self.policy.membership_required() {
            handlers.register(
                MEMBER_OF_KEY,
                Arc::new(
                    GroupsLoader::new(filters.clone())
                        .with_concurrency(self.directory.membership_concurrency),
                ),
            );
        }
        if self.user_info.load_thumbnail {
            handlers.register(THUMBNAIL_KEY, Arc::new(ThumbnailLoader::new(filters)));
        }
        for (name, handler) in self.extra {
            handlers.register(name, handler);
        }
        for name in &self.removed {
            handlers.remove(name);
        }

        let normalizer = self.normalizer.unwrap_or_else(|| {
            UsernameNormalizer::with_domains([
                self.directory.domain.as_str(),
                fqdn.as_deref().unwrap_or_default(),
            ])
            .shared()
        });

        debug!(handlers = ?handlers, "Authenticator ready");

        Ok(Authenticator {
            connector: self.connector,
            normalizer,
            fqdn,
            handlers,
            policy: AccessPolicy::new(self.policy),
        })
    }
}
