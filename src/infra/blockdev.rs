//! Block device plumbing
//!
//! Loop devices, mounts and partition metadata, all driven through the
//! standard util-linux tools.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::infra::process::Cmd;

/// Attach a file to the next free loop device and return the device path.
///
/// With `partscan` the kernel also scans the file's partition table and
/// creates `p1`, `p2`, ... child devices (needed for ISOs and disk images).
pub fn attach_loop(file: &Path, partscan: bool) -> Result<String> {
    let mut cmd = Cmd::new("losetup").arg("-f");
    if partscan {
        cmd = cmd.arg("-P");
    }
    let device = cmd
        .arg("--show")
        .arg_path(file)
        .run_capture()
        .with_context(|| format!("losetup failed for {}", file.display()))?;
    if device.is_empty() {
        bail!("losetup returned no device for {}", file.display());
    }
    Ok(device)
}

/// Detach a loop device, ignoring failures (already detached, never existed).
pub fn detach_loop(device: &str) {
    Cmd::new("losetup").arg("-d").arg(device).run_best_effort();
}

/// Mount a block device at `mount_point`.
pub fn mount(device: &str, mount_point: &Path, read_only: bool) -> Result<()> {
    let mut cmd = Cmd::new("mount").arg(device).arg_path(mount_point);
    if read_only {
        cmd = cmd.args(["-o", "ro"]);
    }
    cmd.run()
        .with_context(|| format!("Failed to mount {device} at {}", mount_point.display()))?;
    Ok(())
}

/// Bind-mount `source` over `dest`.
pub fn bind_mount(source: &Path, dest: &Path) -> Result<()> {
    Cmd::new("mount")
        .arg("--bind")
        .arg_path(source)
        .arg_path(dest)
        .run()
        .with_context(|| {
            format!(
                "Failed to bind mount {} over {}",
                source.display(),
                dest.display()
            )
        })?;
    Ok(())
}

/// Mount a proc filesystem at `dest`.
pub fn mount_proc(dest: &Path) -> Result<()> {
    Cmd::new("mount")
        .args(["--types", "proc", "/proc"])
        .arg_path(dest)
        .run()
        .with_context(|| format!("Failed to mount proc at {}", dest.display()))?;
    Ok(())
}

/// Mount a fresh devpts at `dest`.
pub fn mount_devpts(dest: &Path) -> Result<()> {
    Cmd::new("mount")
        .args(["--types", "devpts", "devpts"])
        .arg_path(dest)
        .run()
        .with_context(|| format!("Failed to mount devpts at {}", dest.display()))?;
    Ok(())
}

/// Lazy force-unmount, suppressing all errors. Safe to call on paths that
/// were never mounted.
pub fn umount_lazy(path: &str) {
    Cmd::new("umount").args(["-lf", path]).run_best_effort();
}

/// Recursive lazy unmount of a whole subtree, errors suppressed.
pub fn umount_recursive(path: &Path) {
    Cmd::new("umount")
        .arg("-lR")
        .arg_path(path)
        .run_best_effort();
}

/// PARTUUID of a partition, as assigned by the GPT.
pub fn partuuid(partition: &str) -> Result<String> {
    let uuid = Cmd::new("blkid")
        .args(["-o", "value", "-s", "PARTUUID", partition])
        .run_capture()
        .with_context(|| format!("blkid failed for {partition}"))?;
    if uuid.is_empty() {
        bail!("No PARTUUID reported for {partition}");
    }
    Ok(uuid)
}

#[derive(Debug, Deserialize)]
struct LsblkReport {
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    size: u64,
}

/// Index (1-based) of the largest partition on `device`.
///
/// `lsblk -nbJ -o SIZE` lists the whole device first, then its partitions
/// in table order.
pub fn largest_partition(device: &str) -> Result<u32> {
    let json = Cmd::new("lsblk")
        .args(["-nbJ", device, "-o", "SIZE"])
        .run_capture()
        .with_context(|| format!("lsblk failed for {device}"))?;
    let report: LsblkReport =
        serde_json::from_str(&json).context("Failed to parse lsblk output")?;

    let partitions = report.blockdevices.get(1..).unwrap_or_default();
    let (index, _) = partitions
        .iter()
        .enumerate()
        .max_by_key(|(_, dev)| dev.size)
        .with_context(|| format!("{device} has no partitions"))?;
    Ok(u32::try_from(index).unwrap_or(0) + 1)
}

/// Byte size of a single block device node.
pub fn device_size_bytes(device: &str) -> Result<u64> {
    let size = Cmd::new("lsblk")
        .args(["-nbdo", "SIZE", device])
        .run_capture()
        .with_context(|| format!("lsblk failed for {device}"))?;
    size.parse()
        .with_context(|| format!("Unexpected lsblk size output for {device}: '{size}'"))
}

/// ext4 block count of a filesystem, read from the superblock.
pub fn block_count(partition: &str) -> Result<u64> {
    let output = Cmd::new("dumpe2fs")
        .args(["-h", partition])
        .run()
        .with_context(|| format!("dumpe2fs failed for {partition}"))?;
    parse_block_count(output.stdout_trimmed())
        .with_context(|| format!("No block count in dumpe2fs output for {partition}"))
}

/// Extract the `Block count:` value from `dumpe2fs -h` output.
pub fn parse_block_count(output: &str) -> Option<u64> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("Block count:"))
        .and_then(|rest| rest.trim().parse().ok())
}
