//! caregated — the caregate gateway daemon.
//!
//! Hosts the service registry for the hospital gateway:
//! - Loads `caregate.toml` plus environment overrides
//! - Registers the bootstrap services and checks them immediately
//! - Runs the periodic health check scheduler
//! - Serves the registry REST API
//!
//! # Usage
//!
//! ```text
//! caregated serve --port 8080 --config /etc/caregate/caregate.toml
//! caregated check --config caregate.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use caregate_registry::RegistryConfig;

mod check;
mod serve;

#[derive(Parser)]
#[command(name = "caregated", about = "caregate service registry daemon", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the registry, its scheduler and the REST API until Ctrl-C.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Path to caregate.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check every configured service once, print the results as JSON and
    /// exit non-zero unless all of them are healthy.
    Check {
        /// Path to caregate.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve { port, config } => {
            let config = load_config(config.as_deref())?;
            serve::run_serve(port, config).await
        }
        Command::Check { config } => {
            let config = load_config(config.as_deref())?;
            let all_healthy = check::run_check(config).await?;
            if !all_healthy {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,caregated=debug,caregate_registry=debug,caregate_api=debug",
        )
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load, override from the environment, and validate. Any error aborts startup.
fn load_config(path: Option<&Path>) -> anyhow::Result<RegistryConfig> {
    let mut config = match path {
        Some(path) => RegistryConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RegistryConfig::default(),
    };
    config
        .apply_process_env()
        .context("applying environment overrides")?;
    config.validate().context("invalid registry configuration")?;
    info!(
        services = config.services.len(),
        interval = %config.health_check_interval,
        timeout = %config.health_check_timeout,
        max_retries = config.max_retries,
        "configuration loaded"
    );
    Ok(config)
}
