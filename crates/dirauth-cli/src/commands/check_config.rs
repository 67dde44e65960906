//! check-config command - load and validate the configuration

use super::{print_json, CommandContext};
use anyhow::Result;
use serde_json::json;

pub fn execute(ctx: &CommandContext) -> Result<()> {
    let config = ctx.validated_config()?;

    print_json(&json!({
        "valid": true,
        "server_url": config.directory.server_url,
        "bind_domain": config.directory.bind_domain(),
        "membership_required": config.policy.membership_required(),
        "load_thumbnail": config.user_info.load_thumbnail,
    }))
}
