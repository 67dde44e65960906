//! CLI command implementations

pub mod authenticate;
pub mod check_config;
pub mod groups;
pub mod probe;

use anyhow::Result;
use dirauth_core::config::DirauthConfig;
use serde::Serialize;

/// Context passed to all commands
pub struct CommandContext {
    pub config: DirauthConfig,
}

impl CommandContext {
    /// Validated configuration, or the first problem found
    pub fn validated_config(&self) -> Result<&DirauthConfig> {
        self.config.validate()?;
        Ok(&self.config)
    }
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
