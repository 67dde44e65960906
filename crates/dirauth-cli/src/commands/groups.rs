//! groups command - resolve transitive membership with the service account

use super::{print_json, CommandContext};
use anyhow::Result;
use dirauth_auth::directory::DirectoryQuery;
use dirauth_auth::{
    Filters, GroupCatalog, LdapDirectory, MembershipOutcome, MembershipResolver,
    NormalizeUsername, UsernameNormalizer,
};
use serde_json::json;
use tracing::info;

pub async fn execute(ctx: &CommandContext, username: &str) -> Result<()> {
    let config = ctx.validated_config()?;
    let directory = &config.directory;

    let normalizer = UsernameNormalizer::with_domains([
        directory.domain.as_str(),
        directory.bind_domain().unwrap_or_default(),
    ]);
    let username = normalizer.normalize(username);

    let filters = Filters::new(directory.filters.clone());
    let session = LdapDirectory::new(directory.clone()).service_session().await?;

    let resolved = async {
        let catalog = GroupCatalog::load(&session, &filters).await?;
        MembershipResolver::new(filters.clone())
            .with_concurrency(directory.membership_concurrency)
            .resolve_outcome(&session, &username, &catalog)
            .await
    }
    .await;
    session.close().await;

    match resolved? {
        MembershipOutcome::Resolved(groups) => {
            info!(username = %username, groups = groups.len(), "Resolved membership");
            print_json(&groups)
        }
        MembershipOutcome::UserNotFound => print_json(&json!({
            "username": username,
            "error": "user not found",
        })),
        MembershipOutcome::AttributeAbsent => print_json(&json!({
            "username": username,
            "error": "user entry has no memberOf attribute",
        })),
    }
}
