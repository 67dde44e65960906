//! Group catalog
//!
//! A one-shot snapshot of every group in the directory, used to enrich
//! resolved memberships with metadata. Loading it scans the whole directory,
//! so it is done at most once per resolution and never cached across logins.

use crate::directory::{DirectoryEntry, DirectoryQuery, DirectoryResult, SearchRequest};
use crate::filter::Filters;
use crate::metrics;
use crate::name::extract_name;
use dirauth_core::types::GroupRecord;
use std::collections::HashMap;
use tracing::debug;

/// All groups keyed by DN
#[derive(Debug, Clone, Default)]
pub struct GroupCatalog {
    groups: HashMap<String, GroupRecord>,
}

impl GroupCatalog {
    /// Load every group with a single search
    pub async fn load(query: &dyn DirectoryQuery, filters: &Filters) -> DirectoryResult<Self> {
        let request = SearchRequest::subtree(filters.group_catalog()).with_attrs(["mail"]);
        metrics::record_directory_query("group_catalog");
        let entries = query.search(&request).await?;

        let catalog = Self::from_entries(entries);
        debug!(groups = catalog.len(), "Loaded group catalog");
        Ok(catalog)
    }

    /// Build from raw entries; the first entry for a DN wins
    pub fn from_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let mut groups = HashMap::new();
        for entry in entries {
            if groups.contains_key(&entry.dn) {
                continue;
            }
            let record = group_record(&entry);
            groups.insert(entry.dn, record);
        }
        Self { groups }
    }

    pub fn get(&self, dn: &str) -> Option<&GroupRecord> {
        self.groups.get(dn)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn group_record(entry: &DirectoryEntry) -> GroupRecord {
    let mut record = GroupRecord::new(entry.dn.clone(), extract_name(&entry.dn));
    if let Some(mail) = entry.first("mail") {
        record.mail = Some(mail_local_part(mail).to_string());
    }
    record
}

/// Part of an address before `@`; the whole value when there is no `@`
fn mail_local_part(mail: &str) -> &str {
    mail.split_once('@').map(|(local, _)| local).unwrap_or(mail)
}
