//! Login name normalization
//!
//! Users type their login in many shapes (`JDoe`, `CORP\jdoe`,
//! `jdoe@corp.com`). Everything downstream works with one canonical form: the
//! trimmed, lowercased account name.

use std::sync::Arc;

/// Turns a raw login into the canonical username
pub trait NormalizeUsername: Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}

impl<F> NormalizeUsername for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn normalize(&self, raw: &str) -> String {
        self(raw)
    }
}

/// Default normalizer.
///
/// Lowercases and trims, drops a `DOMAIN\` prefix, and drops an `@domain`
/// suffix. When domains are configured only those suffixes are stripped, so
/// a principal name in a foreign realm is kept intact.
#[derive(Debug, Clone, Default)]
pub struct UsernameNormalizer {
    domains: Vec<String>,
}

impl UsernameNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only strip suffixes for these domains
    pub fn with_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for domain in domains {
            let domain = domain.as_ref().trim().to_lowercase();
            if !domain.is_empty() && !out.contains(&domain) {
                out.push(domain);
            }
        }
        Self { domains: out }
    }

    pub fn shared(self) -> Arc<dyn NormalizeUsername> {
        Arc::new(self)
    }
}

impl NormalizeUsername for UsernameNormalizer {
    fn normalize(&self, raw: &str) -> String {
        let mut name = raw.trim().to_lowercase();

        if let Some((_, account)) = name.split_once('\\') {
            name = account.to_string();
        }

        if let Some((account, domain)) = name.rsplit_once('@') {
            if self.domains.is_empty() || self.domains.iter().any(|d| d == domain) {
                name = account.to_string();
            }
        }

        name.trim().to_string()
    }
}

/// Name to bind with.
///
/// Bare account names are qualified with the directory domain; a name that
/// still carries a realm is already a principal name and is used as is.
pub fn bind_name(username: &str, fqdn: Option<&str>) -> String {
    match fqdn {
        Some(fqdn) if !username.contains('@') && !fqdn.is_empty() => {
            format!("{}@{}", username, fqdn)
        }
        _ => username.to_string(),
    }
}
