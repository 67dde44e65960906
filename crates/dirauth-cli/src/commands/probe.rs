//! probe command - root DSE information via the service account

use super::{print_json, CommandContext};
use anyhow::{bail, Result};
use dirauth_auth::LdapDirectory;

pub async fn execute(ctx: &CommandContext) -> Result<()> {
    let config = ctx.validated_config()?;
    let status = LdapDirectory::new(config.directory.clone()).status().await;

    print_json(&status)?;
    if let Some(error) = status.error {
        bail!("probe failed: {}", error);
    }
    Ok(())
}
