//! Group membership handler

use super::EnrichmentHandler;
use crate::catalog::GroupCatalog;
use crate::directory::DirectoryQuery;
use crate::filter::Filters;
use crate::membership::{MembershipOutcome, MembershipResolver};
use crate::metrics;
use async_trait::async_trait;
use dirauth_core::types::{UserData, UserValue};
use dirauth_core::{Error, Result};
use tracing::warn;

/// Resolves the user's transitive group membership into the `memberOf` key.
///
/// When the user entry cannot be found, or carries no membership attribute,
/// nothing is written. Access checks then report the missing key as a
/// configuration problem instead of treating the user as group-less.
pub struct GroupsLoader {
    filters: Filters,
    resolver: MembershipResolver,
}

impl GroupsLoader {
    pub fn new(filters: Filters) -> Self {
        Self {
            resolver: MembershipResolver::new(filters.clone()),
            filters,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.resolver = self.resolver.with_concurrency(concurrency);
        self
    }
}

#[async_trait]
impl EnrichmentHandler for GroupsLoader {
    async fn load(
        &self,
        session: &dyn DirectoryQuery,
        data: &UserData,
    ) -> Result<Option<UserValue>> {
        let username = data
            .username()
            .ok_or_else(|| Error::Configuration("username is not set".to_string()))?;

        let catalog = GroupCatalog::load(session, &self.filters).await?;

        match self.resolver.resolve_outcome(session, username, &catalog).await? {
            MembershipOutcome::Resolved(membership) => {
                metrics::record_resolved_groups(membership.len());
                Ok(Some(UserValue::Groups(membership)))
            }
            MembershipOutcome::UserNotFound => {
                warn!(username = %username, "User entry not found while loading groups");
                Ok(None)
            }
            MembershipOutcome::AttributeAbsent => {
                warn!(username = %username, "User entry carries no memberOf attribute");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::MemoryDirectory;

    const SALES: &str = "CN=Sales,OU=Groups,DC=corp,DC=local";
    const EMEA: &str = "CN=EMEA,OU=Groups,DC=corp,DC=local";

    #[tokio::test]
    async fn test_loads_enriched_membership() {
        let directory = MemoryDirectory::new()
            .with_user("jdoe", &[SALES])
            .with_group(SALES, Some("sales@corp.com"), &["CN=jdoe,OU=Users,DC=corp,DC=local"])
            .with_group(EMEA, None, &[SALES]);

        let data = UserData::for_user("jdoe", "corp.local");
        let value = GroupsLoader::new(Filters::default())
            .load(&directory, &data)
            .await
            .unwrap()
            .unwrap();

        let groups = value.as_groups().unwrap();
        assert_eq!(groups.dns().collect::<Vec<_>>(), vec![SALES, EMEA]);
        assert_eq!(groups.get(SALES).unwrap().mail(), Some("sales"));
        assert_eq!(groups.get(EMEA).unwrap().name, "EMEA");
    }

    #[tokio::test]
    async fn test_user_without_groups_gets_empty_map() {
        let directory = MemoryDirectory::new().with_user_entry(
            crate::directory::DirectoryEntry::new("CN=jdoe,OU=Users,DC=corp,DC=local")
                .with_attr("sAMAccountName", ["jdoe"])
                .with_attr("memberOf", Vec::<String>::new()),
        );

        let data = UserData::for_user("jdoe", "corp.local");
        let value = GroupsLoader::new(Filters::default())
            .load(&directory, &data)
            .await
            .unwrap();
        assert_eq!(value.and_then(|v| v.as_groups().map(|g| g.len())), Some(0));
    }

    #[tokio::test]
    async fn test_missing_attribute_writes_nothing() {
        let directory = MemoryDirectory::new().with_user("jdoe", &[]);
        let data = UserData::for_user("jdoe", "corp.local");
        let value = GroupsLoader::new(Filters::default())
            .load(&directory, &data)
            .await
            .unwrap();
        assert!(value.is_none());

        let data = UserData::for_user("ghost", "corp.local");
        let value = GroupsLoader::new(Filters::default())
            .load(&directory, &data)
            .await
            .unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let directory = MemoryDirectory::new()
            .with_user("jdoe", &[SALES])
            .failing_on("member=");

        let data = UserData::for_user("jdoe", "corp.local");
        let err = GroupsLoader::new(Filters::default())
            .load(&directory, &data)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DirectoryError");
    }
}
