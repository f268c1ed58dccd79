//! Command-line interface module
//!
//! Argument parsing and output formatting. No provisioning logic lives
//! here; that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::Parser;

use commands::Commands;

/// Depthboot - bootable Linux images for depthcharge devices
///
/// Provisions a distro rootfs, a signed kernel and the depthcharge
/// partition layout onto an image file or a USB/SD-card.
#[derive(Parser, Debug)]
#[command(name = "depthboot")]
#[command(author, version, about, long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (", env!("VERGEN_GIT_SHA"), ", built ", env!("VERGEN_BUILD_TIMESTAMP"), ")"
))]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        if let Some(cmd) = self.command {
            cmd.run(self.verbose > 0).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}
