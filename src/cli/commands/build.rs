//! Build command implementation
//!
//! Collects the option record and runs the provisioning pipeline.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::cli::output;
use crate::config::defaults;
use crate::core::options::{BuildOptions, Distro, KernelVariant, TargetSelector};
use crate::core::pipeline;

/// Arguments for `depthboot build`
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Distribution to install
    #[arg(long, value_enum)]
    pub distro: Distro,

    /// Distribution version
    #[arg(long, default_value = "latest")]
    pub distro_version: String,

    /// Desktop environment
    #[arg(long, default_value = "gnome")]
    pub desktop: String,

    /// Login shell for the created user
    #[arg(long, default_value = "bash")]
    pub shell: String,

    /// Name of the user account to create
    #[arg(long, default_value = "localuser")]
    pub username: String,

    /// Password of the user account
    #[arg(long)]
    pub password: String,

    /// Target: "image" for a file, or a block device path like /dev/sdb
    #[arg(long, default_value = "image")]
    pub device: String,

    /// Image size in GiB (image target only)
    #[arg(long, default_value_t = 10)]
    pub image_size: u64,

    /// Kernel variant to flash
    #[arg(long, value_enum, default_value_t = KernelVariant::Chromeos)]
    pub kernel: KernelVariant,

    /// Boot with a maximally verbose kernel command line
    #[arg(long)]
    pub verbose_kernel: bool,

    /// Directory with a pre-downloaded rootfs (and optionally a kernel)
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    /// Installer ISO to search for a rootfs (generic distro only)
    #[arg(long)]
    pub iso: Option<PathBuf>,

    /// Manually extracted rootfs directory (generic distro fallback)
    #[arg(long)]
    pub rootfs_path: Option<PathBuf>,

    /// Skip shrinking the image to its content size
    #[arg(long)]
    pub no_shrink: bool,
}

/// Execute the build command
pub async fn execute(args: BuildArgs, verbose: bool) -> Result<()> {
    let target = if args.device == "image" {
        TargetSelector::Image {
            size_gib: args.image_size,
        }
    } else {
        TargetSelector::Device(args.device.clone())
    };

    let options = BuildOptions {
        distro: args.distro,
        distro_version: args.distro_version,
        desktop_environment: args.desktop,
        shell: args.shell,
        username: args.username,
        password: args.password,
        target: target.clone(),
        kernel_variant: args.kernel,
        verbose_kernel: args.verbose_kernel,
        verbose,
        local_path: args.local_path,
        iso_path: args.iso,
        rootfs_path: args.rootfs_path,
        no_shrink: args.no_shrink,
    };

    output::print_info(&format!(
        "Building {} for {}",
        options.distro,
        match &target {
            TargetSelector::Image { size_gib } => format!("a {size_gib} GiB image"),
            TargetSelector::Device(device) => device.clone(),
        }
    ));

    pipeline::run(options.clone()).await?;

    if options.distro == Distro::Generic {
        output::print_warning(
            "Generic ISOs usually include a system installer. Do not use it: it would \
             install the distro in the traditional way, which will not boot here.",
        );
    }

    match &target {
        TargetSelector::Image { .. } => {
            let name = if crate::infra::host::is_crostini() {
                defaults::IMAGE_NAME_CROSTINI
            } else {
                defaults::IMAGE_NAME
            };
            output::print_success(&format!(
                "The ready-to-boot {} depthboot image is located at ./{name}",
                options.distro
            ));
        }
        TargetSelector::Device(_) => {
            output::print_success(&format!("USB/SD-card is ready to boot {}", options.distro));
            output::print_detail("It is safe to remove the USB-drive/SD-card now.");
        }
    }
    Ok(())
}
