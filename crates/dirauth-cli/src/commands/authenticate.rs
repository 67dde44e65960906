//! authenticate command - bind as a user and print the principal

use super::{print_json, CommandContext};
use anyhow::{bail, Result};
use dirauth_auth::Authenticator;

pub async fn execute(ctx: &CommandContext, username: &str, password: &str) -> Result<()> {
    let config = ctx.validated_config()?;
    let authenticator = Authenticator::from_config(config)?;

    match authenticator.authenticate(username, password).await {
        Ok(principal) => print_json(&principal),
        Err(e) => bail!("{}: {}", e.code(), e),
    }
}
