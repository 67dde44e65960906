//! Transitive group membership resolution
//!
//! Starting from the groups listed in the user's `memberOf` attribute, the
//! resolver walks the "member of" relation breadth first: every dequeued group
//! costs one search for the groups that list it as a `member`. A visited set
//! keyed by DN guarantees that each group is queried at most once and that
//! cyclic nesting (A in B in A) terminates.
//!
//! The parent lookups of one traversal level may run concurrently. Results are
//! consumed in queue order by a single task, which is also the only writer of
//! the visited set, so the outcome and the number of queries are identical to
//! a strictly sequential walk.

use crate::catalog::GroupCatalog;
use crate::directory::{DirectoryQuery, DirectoryResult, SearchRequest, NO_ATTRIBUTES};
use crate::filter::Filters;
use crate::metrics;
use crate::name::extract_name;
use dirauth_core::types::{GroupRecord, MembershipMap};
use futures::stream::{self, StreamExt};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

/// Membership attribute on user entries
pub const MEMBER_OF_ATTRIBUTE: &str = "memberOf";

/// Result of a resolution, keeping apart the ways a user can end up with no groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipOutcome {
    /// Traversal ran; the map may be empty
    Resolved(MembershipMap),
    /// The user lookup matched no entry
    UserNotFound,
    /// The user entry carries no membership attribute
    AttributeAbsent,
}

impl MembershipOutcome {
    /// The resolved map, empty for both absent variants
    pub fn into_map(self) -> MembershipMap {
        match self {
            MembershipOutcome::Resolved(map) => map,
            MembershipOutcome::UserNotFound | MembershipOutcome::AttributeAbsent => {
                MembershipMap::new()
            }
        }
    }
}

enum DirectGroups {
    Listed(Vec<String>),
    NoUser,
    NoAttribute,
}

pub struct MembershipResolver {
    filters: Filters,
    concurrency: usize,
}

impl MembershipResolver {
    pub fn new(filters: Filters) -> Self {
        Self {
            filters,
            concurrency: 1,
        }
    }

    /// Parent lookups issued concurrently per level; 1 is strictly sequential
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Transitive membership of `username`, merged with catalog metadata
    pub async fn resolve(
        &self,
        query: &dyn DirectoryQuery,
        username: &str,
        catalog: &GroupCatalog,
    ) -> DirectoryResult<MembershipMap> {
        Ok(self.resolve_outcome(query, username, catalog).await?.into_map())
    }

    pub async fn resolve_outcome(
        &self,
        query: &dyn DirectoryQuery,
        username: &str,
        catalog: &GroupCatalog,
    ) -> DirectoryResult<MembershipOutcome> {
        let direct = match self.direct_groups(query, username).await? {
            DirectGroups::Listed(direct) => direct,
            DirectGroups::NoUser => return Ok(MembershipOutcome::UserNotFound),
            DirectGroups::NoAttribute => {
                debug!(username, "User entry has no membership attribute");
                return Ok(MembershipOutcome::AttributeAbsent);
            }
        };

        let mut membership = self.traverse(query, direct).await?;
        merge_catalog(&mut membership, catalog);

        debug!(username, groups = membership.len(), "Resolved group membership");
        Ok(MembershipOutcome::Resolved(membership))
    }

    async fn direct_groups(
        &self,
        query: &dyn DirectoryQuery,
        username: &str,
    ) -> DirectoryResult<DirectGroups> {
        let request = SearchRequest::subtree(self.filters.user_lookup(username))
            .with_attrs([MEMBER_OF_ATTRIBUTE]);
        metrics::record_directory_query("user_lookup");

        let Some(entry) = query.search_one(&request).await? else {
            debug!(username, "User lookup returned no entry");
            return Ok(DirectGroups::NoUser);
        };

        Ok(match entry.attr(MEMBER_OF_ATTRIBUTE) {
            Some(groups) => DirectGroups::Listed(groups.to_vec()),
            None => DirectGroups::NoAttribute,
        })
    }

    async fn traverse(
        &self,
        query: &dyn DirectoryQuery,
        direct: Vec<String>,
    ) -> DirectoryResult<MembershipMap> {
        let mut membership = MembershipMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        for dn in direct {
            if visited.insert(dn.clone()) {
                membership.insert(provisional(&dn));
                queue.push_back(dn);
            }
        }

        while !queue.is_empty() {
            let level: Vec<String> = queue.drain(..).collect();
            trace!(groups = level.len(), "Expanding traversal level");

            let mut parents = stream::iter(level)
                .map(|dn| self.parents_of(query, dn))
                .buffered(self.concurrency);

            while let Some(found) = parents.next().await {
                for parent in found? {
                    if visited.insert(parent.clone()) {
                        membership.insert(provisional(&parent));
                        queue.push_back(parent);
                    }
                }
            }
        }

        Ok(membership)
    }

    /// DNs of the groups listing `group_dn` as a member
    async fn parents_of(
        &self,
        query: &dyn DirectoryQuery,
        group_dn: String,
    ) -> DirectoryResult<Vec<String>> {
        let request =
            SearchRequest::subtree(self.filters.group_parent(&group_dn)).with_attrs([NO_ATTRIBUTES]);
        metrics::record_directory_query("group_parent");

        let entries = query.search(&request).await?;
        trace!(group = %group_dn, parents = entries.len(), "Loaded parent groups");
        Ok(entries.into_iter().map(|e| e.dn).collect())
    }
}

fn provisional(dn: &str) -> GroupRecord {
    GroupRecord::new(dn, extract_name(dn))
}

/// Swap provisional records for catalog ones; DNs unknown to the catalog keep
/// their `{dn, name}` shape
fn merge_catalog(membership: &mut MembershipMap, catalog: &GroupCatalog) {
    let known: Vec<GroupRecord> = membership
        .dns()
        .filter_map(|dn| catalog.get(dn).cloned())
        .collect();

    for record in known {
        membership.replace(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDirectory;
    use std::collections::BTreeSet;

    const SALES: &str = "CN=Sales,OU=Groups,DC=corp,DC=local";
    const EMEA: &str = "CN=EMEA,OU=Groups,DC=corp,DC=local";
    const STAFF: &str = "CN=Staff,OU=Groups,DC=corp,DC=local";
    const A: &str = "CN=A,OU=Groups,DC=corp,DC=local";
    const B: &str = "CN=B,OU=Groups,DC=corp,DC=local";

    async fn resolve(directory: &MemoryDirectory, username: &str) -> MembershipMap {
        let catalog = GroupCatalog::load(directory, &Filters::default()).await.unwrap();
        MembershipResolver::new(Filters::default())
            .resolve(directory, username, &catalog)
            .await
            .unwrap()
    }

    fn dn_set(map: &MembershipMap) -> BTreeSet<String> {
        map.dns().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn test_direct_group_merged_with_catalog() {
        let directory = MemoryDirectory::new()
            .with_user("jdoe", &[SALES])
            .with_group(SALES, Some("sales@corp.com"), &[]);

        let membership = resolve(&directory, "jdoe").await;

        assert_eq!(membership.len(), 1);
        assert_eq!(
            membership.get(SALES),
            Some(&GroupRecord::new(SALES, "Sales").with_mail("sales"))
        );
    }

    #[tokio::test]
    async fn test_nested_groups_are_resolved_breadth_first() {
        let directory = MemoryDirectory::new()
            .with_user("jdoe", &[SALES])
            .with_group(SALES, None, &["CN=jdoe,OU=Users,DC=corp,DC=local"])
            .with_group(EMEA, None, &[SALES])
            .with_group(STAFF, Some("staff@corp.com"), &[EMEA]);

        let membership = resolve(&directory, "jdoe").await;

        let order: Vec<&str> = membership.dns().collect();
        assert_eq!(order, vec![SALES, EMEA, STAFF]);
        assert_eq!(membership.get(STAFF).unwrap().mail(), Some("staff"));
    }

    #[tokio::test]
    async fn test_cycle_resolves_to_both_groups() {
        let directory = MemoryDirectory::new()
            .with_user("jdoe", &[A])
            .with_group(A, None, &[B])
            .with_group(B, None, &[A]);

        let membership = resolve(&directory, "jdoe").await;

        assert_eq!(dn_set(&membership), BTreeSet::from([A.to_string(), B.to_string()]));
        // one parent lookup per group, never repeated
        assert_eq!(directory.parent_queries().len(), 2);
    }

    #[tokio::test]
    async fn test_diamond_queries_each_group_once() {
        // jdoe -> {A, B}; A -> STAFF; B -> STAFF; STAFF -> EMEA
        let directory = MemoryDirectory::new()
            .with_user("jdoe", &[A, B, A])
            .with_group(STAFF, None, &[A, B])
            .with_group(EMEA, None, &[STAFF]);

        let membership = resolve(&directory, "jdoe").await;

        assert_eq!(
            dn_set(&membership),
            BTreeSet::from([A, B, STAFF, EMEA].map(str::to_string))
        );
        let mut queried = directory.parent_queries();
        let total = queried.len();
        queried.sort();
        queried.dedup();
        assert_eq!(total, 4);
        assert_eq!(queried.len(), 4);
    }

    #[tokio::test]
    async fn test_group_missing_from_catalog_keeps_provisional_shape() {
        let directory = MemoryDirectory::new().with_user("jdoe", &[SALES]);

        let membership = resolve(&directory, "jdoe").await;

        assert_eq!(membership.get(SALES), Some(&GroupRecord::new(SALES, "Sales")));
    }

    #[tokio::test]
    async fn test_outcome_distinguishes_absent_cases() {
        let directory = MemoryDirectory::new()
            .with_user("nogroups", &[])
            .with_user("jdoe", &[SALES]);
        let resolver = MembershipResolver::new(Filters::default());
        let catalog = GroupCatalog::default();

        assert_eq!(
            resolver.resolve_outcome(&directory, "ghost", &catalog).await.unwrap(),
            MembershipOutcome::UserNotFound
        );
        assert_eq!(
            resolver.resolve_outcome(&directory, "nogroups", &catalog).await.unwrap(),
            MembershipOutcome::AttributeAbsent
        );
        assert!(matches!(
            resolver.resolve_outcome(&directory, "jdoe", &catalog).await.unwrap(),
            MembershipOutcome::Resolved(map) if map.len() == 1
        ));

        // both absent variants collapse to an empty map
        assert!(resolver.resolve(&directory, "ghost", &catalog).await.unwrap().is_empty());
        assert!(resolver.resolve(&directory, "nogroups", &catalog).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_membership_attribute_is_resolved_empty() {
        let directory = MemoryDirectory::new().with_user_entry(
            crate::directory::DirectoryEntry::new("CN=empty,OU=Users")
                .with_attr("sAMAccountName", ["empty"])
                .with_attr("memberOf", Vec::<String>::new()),
        );
        let resolver = MembershipResolver::new(Filters::default());

        let outcome = resolver
            .resolve_outcome(&directory, "empty", &GroupCatalog::default())
            .await
            .unwrap();
        assert_eq!(outcome, MembershipOutcome::Resolved(MembershipMap::new()));
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let directory = MemoryDirectory::new()
            .with_user("jdoe", &[SALES])
            .failing_on("member=");
        let resolver = MembershipResolver::new(Filters::default());

        let result = resolver
            .resolve(&directory, "jdoe", &GroupCatalog::default())
            .await;
        assert!(matches!(
            result,
            Err(dirauth_core::DirectoryError::Search { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_fan_out_matches_sequential() {
        let build = || {
            MemoryDirectory::new()
                .with_user("jdoe", &[A, B, SALES])
                .with_group(STAFF, None, &[A, B])
                .with_group(EMEA, None, &[SALES, STAFF])
                .with_group(A, None, &[EMEA])
        };

        let sequential_dir = build();
        let sequential = MembershipResolver::new(Filters::default())
            .resolve(&sequential_dir, "jdoe", &GroupCatalog::default())
            .await
            .unwrap();

        let concurrent_dir = build();
        let concurrent = MembershipResolver::new(Filters::default())
            .with_concurrency(8)
            .resolve(&concurrent_dir, "jdoe", &GroupCatalog::default())
            .await
            .unwrap();

        assert_eq!(sequential, concurrent);
        assert_eq!(
            sequential_dir.parent_queries().len(),
            concurrent_dir.parent_queries().len()
        );
        assert_eq!(concurrent_dir.parent_queries().len(), 5);
    }

    #[tokio::test]
    async fn test_dn_with_reserved_characters_is_escaped() {
        let odd = "CN=R\\, D (Ops),OU=Groups,DC=corp,DC=local";
        let directory = MemoryDirectory::new()
            .with_user("jdoe", &[odd])
            .with_group(STAFF, None, &[odd]);

        let membership = resolve(&directory, "jdoe").await;

        assert!(membership.contains(STAFF));
        assert_eq!(membership.get(odd).unwrap().name, "R, D (Ops)");
        assert!(directory.parent_queries()[0].contains("\\28Ops\\29"));
    }
}
