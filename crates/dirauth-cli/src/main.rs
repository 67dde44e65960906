//! Dirauth - directory authentication from the command line
//!
//! Authenticates users against LDAP / Active Directory and shows what the
//! policy engine makes of them.

mod commands;

use clap::{Parser, Subcommand};
use commands::CommandContext;
use dirauth_core::config::{DirauthConfig, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dirauth")]
#[command(author = "Dirauth Team")]
#[command(version = dirauth_core::VERSION)]
#[command(about = "LDAP / Active Directory authentication and group policy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DIRAUTH_CONFIG")]
    config: Option<String>,

    /// Directory server URL
    #[arg(long, global = true, env = "DIRAUTH_SERVER_URL")]
    server_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DIRAUTH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, global = true, env = "DIRAUTH_LOG_FORMAT")]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind as a user and print the resulting principal
    Authenticate {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "DIRAUTH_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Resolve a user's transitive group membership with the service account
    Groups {
        username: String,
    },

    /// Load and validate the configuration
    CheckConfig,

    /// Query the server's root DSE with the service account
    Probe,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        DirauthConfig::from_file(config_path)?
    } else {
        DirauthConfig::from_env()
    };

    // Override with CLI args
    if let Some(url) = cli.server_url {
        config.directory.server_url = url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    init_logging(&config.logging);

    let ctx = CommandContext { config };

    match cli.command {
        Commands::Authenticate { username, password } => {
            commands::authenticate::execute(&ctx, &username, &password).await
        }
        Commands::Groups { username } => commands::groups::execute(&ctx, &username).await,
        Commands::CheckConfig => commands::check_config::execute(&ctx),
        Commands::Probe => commands::probe::execute(&ctx).await,
    }
}

/// Logs go to stderr so that stdout only carries command output
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        "compact" => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}
