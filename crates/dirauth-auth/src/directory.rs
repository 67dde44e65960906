//! Directory capability
//!
//! The resolution engine never talks to a directory server directly. It only
//! needs a bound session able to run searches, and a connector able to produce
//! such a session from a credential pair.

use async_trait::async_trait;
use dirauth_core::{DirectoryError, Result};
use std::collections::HashMap;
use std::sync::Arc;

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Attribute projection requesting no attributes at all (RFC 4511)
pub const NO_ATTRIBUTES: &str = "1.1";

/// Search scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    Base,
    OneLevel,
    #[default]
    Subtree,
}

/// One search against the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Search base; `None` uses the session default
    pub base: Option<String>,
    pub filter: String,
    pub scope: SearchScope,
    /// Requested attributes; empty means all user attributes
    pub attrs: Vec<String>,
}

impl SearchRequest {
    /// Subtree search below the default base
    pub fn subtree(filter: impl Into<String>) -> Self {
        Self {
            base: None,
            filter: filter.into(),
            scope: SearchScope::Subtree,
            attrs: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_attrs<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs = attrs.into_iter().map(Into::into).collect();
        self
    }
}

/// A directory entry: DN plus attribute values.
///
/// Values that are not valid UTF-8 are kept apart in `bin_attrs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Default::default()
        }
    }

    pub fn with_attr<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_bin_attr(mut self, name: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        self.bin_attrs.insert(name.into(), values);
        self
    }

    /// Attribute values, matching the name case-insensitively
    pub fn attr(&self, name: &str) -> Option<&[String]> {
        lookup(&self.attrs, name).map(Vec::as_slice)
    }

    /// First value of an attribute
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attr(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Raw bytes of an attribute, whichever map the server's values landed in
    pub fn binary(&self, name: &str) -> Option<Vec<Vec<u8>>> {
        if let Some(values) = lookup(&self.bin_attrs, name) {
            return Some(values.clone());
        }
        self.attr(name)
            .map(|values| values.iter().map(|v| v.as_bytes().to_vec()).collect())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        lookup(&self.attrs, name).is_some() || lookup(&self.bin_attrs, name).is_some()
    }
}

fn lookup<'a, V>(map: &'a HashMap<String, V>, name: &str) -> Option<&'a V> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// A bound directory session
#[async_trait]
pub trait DirectoryQuery: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>>;

    /// First matching entry, if any
    async fn search_one(&self, request: &SearchRequest) -> DirectoryResult<Option<DirectoryEntry>> {
        Ok(self.search(request).await?.into_iter().next())
    }

    /// Release the session. Failures are ignored.
    async fn close(&self) {}
}

/// Produces bound sessions
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Bind with a credential pair.
    ///
    /// A rejected credential is `Error::InvalidCredentials`; anything else is a
    /// directory error.
    async fn bind(&self, bind_name: &str, password: &str) -> Result<Arc<dyn DirectoryQuery>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_lookup_is_case_insensitive() {
        let entry = DirectoryEntry::new("CN=jdoe,OU=Users")
            .with_attr("memberOf", ["CN=A,OU=G", "CN=B,OU=G"]);

        assert_eq!(entry.attr("memberof").unwrap().len(), 2);
        assert_eq!(entry.first("MEMBEROF"), Some("CN=A,OU=G"));
        assert!(entry.attr("mail").is_none());
        assert!(entry.has_attr("MemberOf"));
    }

    #[test]
    fn test_binary_falls_back_to_text_values() {
        let entry = DirectoryEntry::new("CN=jdoe")
            .with_attr("objectSid", ["\u{1}\u{1}"])
            .with_bin_attr("thumbnailPhoto", vec![vec![0xff, 0xd8]]);

        assert_eq!(entry.binary("objectsid").unwrap(), vec![vec![1u8, 1u8]]);
        assert_eq!(entry.binary("thumbnailphoto").unwrap(), vec![vec![0xffu8, 0xd8]]);
        assert!(entry.binary("jpegPhoto").is_none());
    }

    #[test]
    fn test_search_request_builder() {
        let request = SearchRequest::subtree("(objectClass=group)")
            .with_base("DC=corp,DC=local")
            .with_scope(SearchScope::OneLevel)
            .with_attrs(["mail"]);

        assert_eq!(request.base.as_deref(), Some("DC=corp,DC=local"));
        assert_eq!(request.scope, SearchScope::OneLevel);
        assert_eq!(request.attrs, vec!["mail".to_string()]);
    }
}
