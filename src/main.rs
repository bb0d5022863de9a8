//! piri lifecycle CLI entry point
//!
//! Parses arguments, sets up logging, runs the command and turns its result
//! into the process exit code:
//! - `install` - install the node as a system service
//! - `uninstall` - stop and unregister the service
//! - `update` - update to the latest release or roll back
//! - `update-internal` - unattended update cycle for the timer

use clap::Parser;
use piri_lifecycle::cli;
use piri_lifecycle::core::error::user_friendly_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // RUST_LOG wins over the command's default level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if !cli.is_interactive() {
        colored::control::set_override(false);
    }

    let code = match cli.execute().await {
        Ok(code) => code,
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            1
        }
    };
    std::process::exit(code);
}
