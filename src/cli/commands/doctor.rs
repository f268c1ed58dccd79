//! Doctor command implementation
//!
//! Checks that the host tools the pipeline drives are installed and
//! reports what is missing together with the providing package.

use anyhow::{bail, Result};

use crate::cli::output::{print_detail, print_info, status};

/// Host tools the pipeline shells out to, with the package that provides
/// them. The optional entries are only needed on some paths (generic ISOs,
/// fedora, image shrinking).
const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("losetup", "util-linux"),
    ("wipefs", "util-linux"),
    ("lsblk", "util-linux"),
    ("blkid", "util-linux"),
    ("parted", "parted"),
    ("cgpt", "vboot-utils"),
    ("futility", "vboot-utils"),
    ("mkfs.ext4", "e2fsprogs"),
    ("dd", "coreutils"),
    ("tar", "tar"),
];

const OPTIONAL_TOOLS: &[(&str, &str)] = &[
    ("unsquashfs", "squashfs-tools"),
    ("e2fsck", "e2fsprogs"),
    ("resize2fs", "e2fsprogs"),
    ("dumpe2fs", "e2fsprogs"),
    ("systemd-detect-virt", "systemd"),
];

/// Execute the doctor command
pub fn execute() -> Result<()> {
    print_info("Checking host tools...");
    println!();

    let mut missing_required = Vec::new();
    for (tool, package) in REQUIRED_TOOLS {
        if which::which(tool).is_ok() {
            println!("  {} {tool}", status::SUCCESS);
        } else {
            println!("  {} {tool}", status::ERROR);
            print_detail(&format!("Install: {package}"));
            missing_required.push(*tool);
        }
    }
    for (tool, package) in OPTIONAL_TOOLS {
        if which::which(tool).is_ok() {
            println!("  {} {tool} [optional]", status::SUCCESS);
        } else {
            println!("  {} {tool} [optional]", status::WARNING);
            print_detail(&format!("Install: {package}"));
        }
    }
    println!();

    if missing_required.is_empty() {
        print_info("All required tools are available");
        Ok(())
    } else {
        bail!("Missing required tools: {}", missing_required.join(", "));
    }
}
