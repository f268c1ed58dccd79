//! Partition planner
//!
//! Wipes the target and lays down the fixed 3-partition depthcharge GPT:
//! two kernel partitions with ChromeOS boot attributes and an ext4 rootfs
//! covering the rest of the device.

use anyhow::{Context, Result};

use crate::config::defaults;
use crate::core::context::BuildContext;
use crate::core::target::StorageTarget;
use crate::error::PartitionError;
use crate::infra::process::Cmd;

/// Partition, format and mount the target.
pub fn create_partitions(ctx: &BuildContext, target: &StorageTarget) -> Result<()> {
    tracing::info!("partitioning {}", target.device);

    Cmd::new("wipefs")
        .args(["-af", &target.device])
        .run()
        .with_context(|| format!("Failed to wipe {}", target.device))?;

    // The kernel may still hold the old table of a device it had open, in
    // which case the rewrite is refused until the device is re-seated.
    let label = Cmd::new("parted")
        .args(["-s", &target.device, "mklabel", "gpt"])
        .run_check()?;
    if !label.success() {
        return Err(PartitionError::TableWrite {
            device: target.device.clone(),
        }
        .into());
    }

    mkpart(target, "Kernel", defaults::KERNEL_A_START_MIB, defaults::KERNEL_A_END_MIB)?;
    mkpart(target, "Kernel", defaults::KERNEL_B_START_MIB, defaults::KERNEL_B_END_MIB)?;
    Cmd::new("parted")
        .args(["-s", "-a", "optimal", &target.device, "unit", "mib", "mkpart", "Root"])
        .arg(defaults::ROOTFS_START_MIB.to_string())
        .arg("100%")
        .run()
        .context("Failed to create rootfs partition")?;

    set_kernel_attributes(target, 1, defaults::KERNEL_A_PRIORITY)?;
    set_kernel_attributes(target, 2, defaults::KERNEL_B_PRIORITY)?;

    let rootfs = target.partition(3);
    tracing::info!("formatting {rootfs} as ext4");
    let mkfs = Cmd::new("mkfs.ext4").args(["-F", &rootfs]).run_check()?;
    if !mkfs.success() {
        return Err(PartitionError::Format {
            partition: rootfs,
            error: mkfs.stderr_trimmed().to_string(),
        }
        .into());
    }

    let mount_point = ctx.mount_point();
    if let Err(e) = crate::infra::blockdev::mount(&rootfs, mount_point, false) {
        return Err(PartitionError::Mount {
            partition: rootfs,
            mount_point: mount_point.to_path_buf(),
            error: format!("{e:#}"),
        }
        .into());
    }

    tracing::info!("device/image preparation complete");
    Ok(())
}

fn mkpart(target: &StorageTarget, name: &str, start_mib: u64, end_mib: u64) -> Result<()> {
    Cmd::new("parted")
        .args(["-s", "-a", "optimal", &target.device, "unit", "mib", "mkpart", name])
        .arg(start_mib.to_string())
        .arg(end_mib.to_string())
        .run()
        .with_context(|| format!("Failed to create partition '{name}' at {start_mib} MiB"))?;
    Ok(())
}

/// Mark a partition as a bootable ChromeOS kernel with the given priority.
fn set_kernel_attributes(target: &StorageTarget, index: u32, priority: u32) -> Result<()> {
    Cmd::new("cgpt")
        .args(["add", "-i"])
        .arg(index.to_string())
        .args(["-t", "kernel", "-S", "1", "-T"])
        .arg(defaults::KERNEL_TRIES.to_string())
        .arg("-P")
        .arg(priority.to_string())
        .arg(&target.device)
        .run()
        .with_context(|| format!("Failed to set kernel attributes on partition {index}"))?;
    Ok(())
}
