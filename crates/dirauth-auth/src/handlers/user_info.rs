//! User attribute projection

use super::EnrichmentHandler;
use crate::directory::{DirectoryEntry, DirectoryQuery, SearchRequest};
use crate::filter::Filters;
use crate::metrics;
use crate::sid::decode_sid;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dirauth_core::config::UserInfoConfig;
use dirauth_core::types::{UserData, UserValue};
use dirauth_core::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Default registration name
pub const USER_INFO_KEY: &str = "userinfo";

const SID_ATTRIBUTE: &str = "objectSid";

/// Loads selected directory attributes of the user, renamed to application fields
#[derive(Debug, Clone)]
pub struct UserInfoLoader {
    filters: Filters,
    attributes: BTreeMap<String, String>,
}

impl UserInfoLoader {
    pub fn new(filters: Filters, config: &UserInfoConfig) -> Self {
        Self {
            filters,
            attributes: config.attributes.clone(),
        }
    }

    pub fn with_attributes(filters: Filters, attributes: BTreeMap<String, String>) -> Self {
        Self {
            filters,
            attributes,
        }
    }

    fn project(&self, entry: &DirectoryEntry) -> BTreeMap<String, UserValue> {
        let mut fields = BTreeMap::new();
        for (attribute, field) in &self.attributes {
            if let Some(value) = self.value_of(entry, attribute) {
                fields.insert(field.clone(), value);
            }
        }
        fields
    }

    fn value_of(&self, entry: &DirectoryEntry, attribute: &str) -> Option<UserValue> {
        if attribute.eq_ignore_ascii_case(SID_ATTRIBUTE) {
            let sids = entry
                .binary(attribute)?
                .iter()
                .filter_map(|raw| decode_sid(raw))
                .collect::<Vec<_>>();
            return (!sids.is_empty()).then(|| UserValue::from_values(sids));
        }

        if let Some(values) = entry.attr(attribute) {
            return (!values.is_empty()).then(|| UserValue::from_values(values.to_vec()));
        }

        let encoded = entry
            .binary(attribute)?
            .iter()
            .map(|raw| STANDARD.encode(raw))
            .collect::<Vec<_>>();
        (!encoded.is_empty()).then(|| UserValue::from_values(encoded))
    }
}

#[async_trait]
impl EnrichmentHandler for UserInfoLoader {
    async fn load(
        &self,
        session: &dyn DirectoryQuery,
        data: &UserData,
    ) -> Result<Option<UserValue>> {
        let username = data
            .username()
            .ok_or_else(|| Error::Configuration("username is not set".to_string()))?;

        let request = SearchRequest::subtree(self.filters.user_lookup(username))
            .with_attrs(self.attributes.keys().cloned());
        metrics::record_directory_query("user_info");
        let entry = session.search_one(&request).await?;

        let fields = match entry {
            Some(entry) => self.project(&entry),
            None => {
                debug!(username = %username, "No user entry for attribute lookup");
                BTreeMap::new()
            }
        };

        Ok(Some(UserValue::Fields(fields)))
    }
}
