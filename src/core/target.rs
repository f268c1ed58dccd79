//! Storage target resolution
//!
//! Turns the user's target selector into a concrete block device: either a
//! fresh sparse image file attached to a loop device, or a normalized
//! physical USB/SD-card device.

use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::context::BuildContext;
use crate::core::options::TargetSelector;
use crate::error::TargetError;
use crate::infra::{blockdev, host};

/// What kind of storage backs the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// Loop device over an image file
    LoopImage { backing: PathBuf },
    /// Embedded-MMC style device (SD card), partitions carry a `p` infix
    Mmc,
    /// USB mass storage, partitions are numbered directly
    Usb,
}

/// A resolved provisioning target and its partition naming scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    /// Block device path (`/dev/loopN`, `/dev/sdX`, `/dev/mmcblkN`)
    pub device: String,
    pub kind: TargetKind,
}

impl StorageTarget {
    /// Whether partitions are numbered without the `p` infix.
    pub fn is_usb(&self) -> bool {
        matches!(self.kind, TargetKind::Usb)
    }

    /// Device path of the given partition (1-based).
    pub fn partition(&self, index: u32) -> String {
        if self.is_usb() {
            format!("{}{index}", self.device)
        } else {
            format!("{}p{index}", self.device)
        }
    }

    /// Backing image file, for loop targets.
    pub fn backing_file(&self) -> Option<&Path> {
        match &self.kind {
            TargetKind::LoopImage { backing } => Some(backing),
            TargetKind::Mmc | TargetKind::Usb => None,
        }
    }
}

/// Resolve the selector into a [`StorageTarget`] and publish it to the
/// cleanup slot so teardown can find it.
pub fn resolve(ctx: &BuildContext, selector: &TargetSelector) -> Result<StorageTarget> {
    let target = match selector {
        TargetSelector::Image { size_gib } => prepare_image(*size_gib)?,
        TargetSelector::Device(name) => prepare_device(name),
    };
    ctx.cleanup_state().set_target(target.clone());
    Ok(target)
}

fn prepare_image(size_gib: u64) -> Result<StorageTarget> {
    let image = PathBuf::from(defaults::IMAGE_NAME);
    tracing::info!("preparing {} ({size_gib} GiB)", image.display());

    allocate_image(&image, size_gib).map_err(|e| TargetError::AllocationFailed {
        path: image.clone(),
        error: e.to_string(),
    })?;

    let device = match blockdev::attach_loop(&image, false) {
        Ok(device) => device,
        Err(e) => {
            // WSL1 has no loop driver at all; everything else is unexpected.
            if host::is_wsl() {
                return Err(TargetError::VirtualizationUnsupported.into());
            }
            return Err(TargetError::AttachFailed {
                path: image,
                error: format!("{e:#}"),
            }
            .into());
        }
    };

    Ok(StorageTarget {
        device,
        kind: TargetKind::LoopImage { backing: image },
    })
}

/// Allocate a sparse file of exactly `size_gib` GiB, falling back to a
/// chunked zero-fill when the filesystem rejects sparse files.
fn allocate_image(path: &Path, size_gib: u64) -> std::io::Result<()> {
    let size_bytes = size_gib * 1024 * 1024 * 1024;
    let file = std::fs::File::create(path)?;
    if file.set_len(size_bytes).is_ok() {
        return Ok(());
    }
    tracing::warn!("sparse allocation unsupported; zero-filling the image");
    zero_fill(path, size_bytes)
}

fn zero_fill(path: &Path, size_bytes: u64) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    let block = vec![0u8; 1024 * 1024];
    let mut remaining = size_bytes;
    while remaining > 0 {
        let n = remaining.min(block.len() as u64) as usize;
        file.write_all(&block[..n])?;
        remaining -= n as u64;
    }
    file.flush()
}

fn prepare_device(name: &str) -> StorageTarget {
    let device = normalize_device_name(name);
    tracing::info!("preparing {device}");

    // Whatever the desktop auto-mounted has to go before repartitioning.
    unmount_device_partitions(&device);

    let kind = if device.contains("mmcblk") {
        TargetKind::Mmc
    } else {
        TargetKind::Usb
    };
    StorageTarget { device, kind }
}

/// Normalize a user-supplied device name: drop a trailing slash or
/// partition digit and prepend `/dev/` when missing.
pub fn normalize_device_name(name: &str) -> String {
    let mut name = name.to_string();
    if name.ends_with('/') || name.ends_with('1') || name.ends_with('2') {
        name.pop();
    }
    if name.starts_with("/dev/") {
        name
    } else {
        format!("/dev/{name}")
    }
}

/// Force-unmount the device and every partition node derived from it,
/// ignoring failures.
fn unmount_device_partitions(device: &str) {
    let Some(base) = Path::new(device).file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return;
    };
    for entry in entries.flatten() {
        let node = entry.file_name();
        let Some(node) = node.to_str() else { continue };
        if node.starts_with(base) {
            blockdev::umount_lazy(&format!("/dev/{node}"));
        }
    }
}
