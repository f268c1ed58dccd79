//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod doctor;

use anyhow::Result;
use clap::Subcommand;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a bootable image or provision a USB/SD-card
    Build(build::BuildArgs),

    /// Check that the required host tools are installed
    Doctor,
}

impl Commands {
    /// Execute the command
    pub async fn run(self, verbose: bool) -> Result<()> {
        match self {
            Self::Build(args) => build::execute(args, verbose).await,
            Self::Doctor => doctor::execute(),
        }
    }
}
