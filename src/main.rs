//! Depthboot CLI - bootable Linux images for depthcharge devices
//!
//! Entry point for the depthboot command-line application.

use anyhow::Result;
use clap::Parser;

use depthboot::cli::output;
use depthboot::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    output::set_quiet(cli.quiet);

    // Run the command and handle errors
    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            output::display_error(&e);
            std::process::exit(1);
        }
    }
}
